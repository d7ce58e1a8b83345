//! # PaperLab Core
//!
//! Core library for PaperLab: discovers papers for a research question,
//! filters them for relevance, analyzes each one, and synthesizes hypotheses
//! and experimental designs across the surviving corpus.
//!
//! The heart of the crate is the concurrent per-paper pipeline
//! ([`PipelineScheduler`]) and the corpus-level [`ResultAggregator`].

pub mod analysis;
pub mod brain;
pub mod cache;
pub mod config;
pub mod discovery;
pub mod error;
pub mod paper;
pub mod pipeline;
pub mod providers;
pub mod types;

// Re-export commonly used types at the crate root.
pub use analysis::{
    ContentAnalysis, ExperimentalDesign, Hypothesis, HypothesisSet, RelevanceVerdict, StageClient,
    StageOutcome,
};
pub use brain::{LlmProvider, MockLlmProvider};
pub use cache::TtlCache;
pub use config::{PaperLabConfig, load_config};
pub use discovery::{DiscoveryResult, DiscoveryService};
pub use error::{PaperLabError, Result};
pub use paper::Paper;
pub use pipeline::{
    AggregatedReport, PaperPipeline, PipelineResult, PipelineScheduler, PipelineStatus,
    ResultAggregator,
};
pub use providers::{RateLimiter, create_provider};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, TokenUsage};
