//! Configuration system for PaperLab.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/paperlab/config.toml` and/or `.paperlab/config.toml`
//! in the workspace directory.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Longest research question accepted by the discovery layer and the scheduler.
pub const MAX_QUESTION_CHARS: usize = 1000;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperLabConfig {
    /// Provider for keyword extraction, relevance filtering and content analysis.
    #[serde(default = "LlmConfig::analysis_default")]
    pub analysis_llm: LlmConfig,
    /// Provider for hypothesis generation and experimental design.
    #[serde(default = "LlmConfig::science_default")]
    pub science_llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for PaperLabConfig {
    fn default() -> Self {
        Self {
            analysis_llm: LlmConfig::analysis_default(),
            science_llm: LlmConfig::science_default(),
            pipeline: PipelineConfig::default(),
            search: SearchConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl PaperLabConfig {
    /// Reject values that would make a run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| {
            Err(ConfigError::Invalid {
                message: message.to_string(),
            })
        };
        if self.pipeline.max_workers == 0 {
            return invalid("pipeline.max_workers must be at least 1");
        }
        if self.pipeline.task_timeout_secs == 0 {
            return invalid("pipeline.task_timeout_secs must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.pipeline.relevance_threshold) {
            return invalid("pipeline.relevance_threshold must be within [0, 1]");
        }
        if self.pipeline.max_input_chars == 0 {
            return invalid("pipeline.max_input_chars must be positive");
        }
        if self.search.page_size == 0 {
            return invalid("search.page_size must be positive");
        }
        if self.search.max_keywords == 0 {
            return invalid("search.max_keywords must be positive");
        }
        if self.cache.max_entries == 0 {
            return invalid("cache.max_entries must be positive");
        }
        Ok(())
    }
}

/// Connection settings for one OpenAI-compatible completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider label: "openai", "together", "local".
    pub provider: String,
    /// Model identifier (e.g., "gpt-4o").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Explicit API key; takes precedence over `api_key_env`. Never serialized.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Optional base URL override for the API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Default temperature for generation.
    pub temperature: f32,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl LlmConfig {
    pub fn analysis_default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: 2048,
            temperature: 0.3,
            request_timeout_secs: 120,
        }
    }

    pub fn science_default() -> Self {
        Self {
            provider: "together".to_string(),
            model: "meta-llama/Llama-3.3-70B-Instruct-Turbo-Free".to_string(),
            api_key_env: "TOGETHER_API_KEY".to_string(),
            api_key: None,
            base_url: Some("https://api.together.xyz/v1".to_string()),
            max_tokens: 4096,
            temperature: 0.7,
            request_timeout_secs: 180,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::analysis_default()
    }
}

/// Per-paper pipeline and scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of papers processed concurrently.
    pub max_workers: usize,
    /// Per-paper timeout in seconds, measured from when the worker slot is acquired.
    pub task_timeout_secs: u64,
    /// Minimum model confidence for a paper to count as relevant.
    pub relevance_threshold: f64,
    /// Characters of paper text submitted to a completion (prefix cut).
    pub max_input_chars: usize,
    /// Minimum spacing between outbound completion calls, per provider.
    pub llm_min_interval_ms: u64,
}

impl PipelineConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn llm_min_interval(&self) -> Duration {
        Duration::from_millis(self.llm_min_interval_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            task_timeout_secs: 300,
            relevance_threshold: 0.7,
            max_input_chars: 14_000,
            llm_min_interval_ms: 1000,
        }
    }
}

/// Paper discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of papers requested per query (clamped to [3, 49]).
    pub max_papers: usize,
    /// Minimum spacing between arXiv API requests.
    pub min_interval_ms: u64,
    /// Results requested per arXiv API page.
    pub page_size: usize,
    /// Upper bound on extracted keywords.
    pub max_keywords: usize,
    /// Pages of a PDF converted to text.
    pub fulltext_max_pages: usize,
    /// Characters of extracted PDF text kept.
    pub fulltext_max_chars: usize,
}

impl SearchConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_papers: 20,
            min_interval_ms: 3000,
            page_size: 50,
            max_keywords: 7,
            fulltext_max_pages: 20,
            fulltext_max_chars: 100_000,
        }
    }
}

/// Discovery result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            max_entries: 1000,
        }
    }
}

/// Exponential backoff for transient provider errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl RetryConfig {
    /// No retries at all; used by tests and latency-sensitive callers.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `PAPERLAB_`)
/// 3. Workspace-local config (`.paperlab/config.toml`)
/// 4. User config (`~/.config/paperlab/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&PaperLabConfig>,
) -> Result<PaperLabConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(PaperLabConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "paperlab", "paperlab") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".paperlab").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (PAPERLAB_PIPELINE__MAX_WORKERS, PAPERLAB_ANALYSIS_LLM__MODEL, ...)
    figment = figment.merge(Env::prefixed("PAPERLAB_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: PaperLabConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from one explicit TOML file layered over the defaults.
pub fn load_config_file(path: &Path) -> Result<PaperLabConfig, ConfigError> {
    let config: PaperLabConfig = Figment::from(Serialized::defaults(PaperLabConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PAPERLAB_").split("__"))
        .extract()
        .map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PaperLabConfig::default();
        assert_eq!(config.analysis_llm.model, "gpt-4o");
        assert_eq!(config.science_llm.provider, "together");
        assert_eq!(config.pipeline.max_workers, 4);
        assert_eq!(config.pipeline.task_timeout_secs, 300);
        assert_eq!(config.pipeline.max_input_chars, 14_000);
        assert!((config.pipeline.relevance_threshold - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = PaperLabConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: PaperLabConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.science_llm.model, config.science_llm.model);
        assert_eq!(deserialized.search.page_size, config.search.page_size);
    }

    #[test]
    fn test_api_key_never_serialized() {
        let mut config = PaperLabConfig::default();
        config.analysis_llm.api_key = Some("sk-secret".into());
        let toml_str = toml::to_string(&config).unwrap();
        assert!(!toml_str.contains("sk-secret"));
    }

    #[test]
    fn test_load_config_with_overrides() {
        let mut overrides = PaperLabConfig::default();
        overrides.pipeline.max_workers = 3;
        overrides.pipeline.relevance_threshold = 0.65;

        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(config.pipeline.max_workers, 3);
        assert!((config.pipeline.relevance_threshold - 0.65).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".paperlab");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            r#"
[pipeline]
max_workers = 2
task_timeout_secs = 60
relevance_threshold = 0.8
max_input_chars = 8000
llm_min_interval_ms = 250

[science_llm]
provider = "local"
model = "llama3.1:8b"
api_key_env = "LOCAL_KEY"
base_url = "http://localhost:11434/v1"
max_tokens = 1024
temperature = 0.5
request_timeout_secs = 30
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.pipeline.max_workers, 2);
        assert_eq!(config.pipeline.task_timeout(), Duration::from_secs(60));
        assert_eq!(config.science_llm.model, "llama3.1:8b");
        // Sections absent from the file keep their defaults
        assert_eq!(config.analysis_llm.model, "gpt-4o");
        assert_eq!(config.search.max_keywords, 7);
    }

    #[test]
    fn test_load_config_rejects_invalid_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paperlab.toml");
        std::fs::write(
            &path,
            r#"
[pipeline]
max_workers = 4
task_timeout_secs = 300
relevance_threshold = 1.5
max_input_chars = 14000
llm_min_interval_ms = 1000
"#,
        )
        .unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_validate_zero_workers() {
        let mut config = PaperLabConfig::default();
        config.pipeline.max_workers = 0;
        assert!(config.validate().is_err());
    }
}
