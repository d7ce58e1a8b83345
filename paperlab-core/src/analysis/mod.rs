//! LLM-backed analysis stages.
//!
//! Each stage talks to a completion provider through a [`StageClient`]
//! (shared rate limiter + retry) and never returns an error: provider
//! failures, unparseable responses and missing credentials are folded into
//! [`StageOutcome::Degraded`] carrying a best-effort value and the cause.

pub mod content;
pub mod experiment;
pub mod hypothesis;
pub mod relevance;
pub mod sections;

pub use content::{ContentAnalysis, ContentAnalyzer, LlmContentAnalyzer};
pub use experiment::{ExperimentDesigner, ExperimentalDesign, LlmExperimentDesigner};
pub use hypothesis::{Hypothesis, HypothesisGenerator, HypothesisSet, LlmHypothesisGenerator};
pub use relevance::{LlmRelevanceClassifier, RelevanceClassifier, RelevanceVerdict};
pub use sections::{ParsedSections, Section, parse_sections};

use crate::brain::LlmProvider;
use crate::config::RetryConfig;
use crate::error::LlmError;
use crate::providers::{RateLimiter, with_retry};
use crate::types::CompletionRequest;
use serde_json::Value;
use std::sync::Arc;

/// The result of one analysis stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    /// The stage produced a genuine result.
    Produced(T),
    /// The stage failed; `value` is the documented fallback.
    Degraded { value: T, cause: String },
}

impl<T> StageOutcome<T> {
    pub fn degraded(value: T, cause: impl Into<String>) -> Self {
        StageOutcome::Degraded {
            value,
            cause: cause.into(),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            StageOutcome::Produced(value) | StageOutcome::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            StageOutcome::Produced(value) | StageOutcome::Degraded { value, .. } => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded { .. })
    }

    pub fn cause(&self) -> Option<&str> {
        match self {
            StageOutcome::Produced(_) => None,
            StageOutcome::Degraded { cause, .. } => Some(cause),
        }
    }
}

/// Why a stage could not produce a value.
#[derive(Debug, Clone, thiserror::Error)]
pub(crate) enum StageFailure {
    #[error(transparent)]
    Provider(#[from] LlmError),
    #[error("unusable response: {0}")]
    Unusable(String),
}

/// Rate-limited, retrying access to one completion provider.
///
/// Cloning is cheap; clones share the provider and the limiter.
#[derive(Clone)]
pub struct StageClient {
    provider: Arc<dyn LlmProvider>,
    limiter: Arc<RateLimiter>,
    retry: RetryConfig,
}

impl StageClient {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        limiter: Arc<RateLimiter>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            provider,
            limiter,
            retry,
        }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Send one system/user exchange and return the reply text.
    ///
    /// Every attempt, retries included, waits on the shared limiter first.
    pub async fn ask(&self, system: &str, user: &str, json_mode: bool) -> Result<String, LlmError> {
        with_retry(&self.retry, || async {
            self.limiter.acquire().await;
            let request = CompletionRequest::instructed(system, user).with_json_mode(json_mode);
            self.provider
                .complete(request)
                .await
                .map(|response| response.text().to_string())
        })
        .await
    }
}

/// Prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            tracing::debug!(
                original_chars = text.chars().count(),
                kept_chars = max_chars,
                "Truncating paper text"
            );
            &text[..byte_idx]
        }
        None => text,
    }
}

/// Pull a JSON object out of a model reply.
///
/// Accepts a bare object, one wrapped in a Markdown code fence, or an object
/// embedded in surrounding prose.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Some(fenced) = strip_code_fence(trimmed)
        && let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(fenced)
    {
        return Some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

fn strip_code_fence(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    // Skip the language tag line ("json", "JSON", ...).
    let body_start = after.find('\n')? + 1;
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// First present key among `keys` holding a non-null value.
pub(crate) fn field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find(|v| !v.is_null())
}

/// Trimmed string under any of `keys`.
pub(crate) fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    match field(value, keys)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A list of strings under any of `keys`; a lone string counts as one entry.
pub(crate) fn string_list(value: &Value, keys: &[&str]) -> Vec<String> {
    let Some(found) = field(value, keys) else {
        return Vec::new();
    };
    let items: Vec<String> = match found {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .collect(),
        Value::String(s) => vec![s.trim().to_string()],
        _ => Vec::new(),
    };
    items.into_iter().filter(|s| !s.is_empty()).collect()
}
