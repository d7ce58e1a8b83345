//! Error types for the PaperLab core.
//!
//! Uses `thiserror` for public API error types. Provider failures (`LlmError`)
//! never escape the analysis stages; they are folded into degraded stage
//! outcomes. The remaining variants cover caller misuse, orchestration faults,
//! aggregation over empty input, search and configuration.

/// Top-level error type for the PaperLab core library.
#[derive(Debug, thiserror::Error)]
pub enum PaperLabError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from text-completion provider interactions.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },

    #[error("Provider returned an empty completion")]
    EmptyResponse,
}

/// Caller misuse, rejected before any concurrent work is scheduled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Research question cannot be empty")]
    EmptyQuestion,

    #[error("Research question is too long ({len} characters, max {max})")]
    QuestionTooLong { len: usize, max: usize },

    #[error("No papers submitted")]
    NoPapers,
}

/// Faults in the per-paper orchestration itself (not in the stages it calls).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid pipeline transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

/// Errors from result aggregation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregationError {
    #[error("No successful pipeline results to aggregate ({total} submitted)")]
    NothingToAggregate { total: usize },
}

/// Errors from paper search backends.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    #[error("No valid keywords provided")]
    NoKeywords,

    #[error("Search request failed: {message}")]
    Request { message: String },

    #[error("Failed to parse search response: {message}")]
    Parse { message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration load error: {0}")]
    Load(#[from] Box<figment::Error>),
}

/// A type alias for results using the top-level `PaperLabError`.
pub type Result<T> = std::result::Result<T, PaperLabError>;
