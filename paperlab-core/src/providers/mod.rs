//! Completion provider implementations and call plumbing.
//!
//! - `OpenAiCompatibleProvider` speaks the OpenAI chat completions format
//!   (OpenAI, Together AI, local servers).
//! - `UnavailableProvider` stands in when credentials are missing so the
//!   analysis stages degrade instead of the whole run failing.
//! - `with_retry` wraps a call in exponential backoff for transient errors.
//!
//! Use `create_provider()` to instantiate the appropriate provider based on config.

pub mod openai_compat;
pub mod rate_limiter;

use crate::brain::LlmProvider;
use crate::config::{LlmConfig, RetryConfig};
use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub use openai_compat::OpenAiCompatibleProvider;
pub use rate_limiter::RateLimiter;

/// Execute an async operation with exponential backoff retry on transient errors.
///
/// Retries on `LlmError::RateLimited` (respects `retry_after_secs`), `LlmError::Connection`,
/// `LlmError::Timeout` and `LlmError::EmptyResponse`. Permanent errors (auth, parse) return
/// immediately.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T, LlmError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut last_err = None;
    for attempt in 0..=config.max_retries {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if !is_retryable(&e) || attempt == config.max_retries {
                    return Err(e);
                }

                let backoff_ms = compute_backoff(config, attempt, &e);
                tracing::warn!(
                    attempt = attempt + 1,
                    max = config.max_retries,
                    backoff_ms = backoff_ms,
                    error = %e,
                    "Retrying after transient error"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| LlmError::Connection {
        message: "All retry attempts exhausted".to_string(),
    }))
}

/// Check if an error is retryable (transient).
fn is_retryable(err: &LlmError) -> bool {
    matches!(
        err,
        LlmError::RateLimited { .. }
            | LlmError::Connection { .. }
            | LlmError::Timeout { .. }
            | LlmError::EmptyResponse
    )
}

/// Compute backoff delay, respecting rate limit retry-after hints.
fn compute_backoff(config: &RetryConfig, attempt: u32, err: &LlmError) -> u64 {
    if let LlmError::RateLimited { retry_after_secs } = err {
        let server_ms = retry_after_secs * 1000;
        let computed = compute_exponential_backoff(config, attempt);
        return server_ms.max(computed);
    }
    compute_exponential_backoff(config, attempt)
}

/// Pure exponential backoff with optional jitter.
fn compute_exponential_backoff(config: &RetryConfig, attempt: u32) -> u64 {
    let base = config.initial_backoff_ms as f64 * config.backoff_multiplier.powi(attempt as i32);
    let capped = base.min(config.max_backoff_ms as f64) as u64;
    if config.jitter {
        // Add up to 25% jitter
        let jitter = (capped as f64 * 0.25 * rand_simple()) as u64;
        capped + jitter
    } else {
        capped
    }
}

/// Simple pseudo-random fraction for jitter (avoids pulling in rand crate).
fn rand_simple() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// Placeholder provider used when a backend cannot be reached at all
/// (typically missing credentials). Every call fails with the recorded cause.
pub struct UnavailableProvider {
    model: String,
    cause: LlmError,
}

impl UnavailableProvider {
    pub fn new(model: impl Into<String>, cause: LlmError) -> Self {
        Self {
            model: model.into(),
            cause,
        }
    }
}

#[async_trait]
impl LlmProvider for UnavailableProvider {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Err(self.cause.clone())
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Create a provider from configuration.
///
/// Construction failures (missing API key, bad client settings) do not abort:
/// the returned provider is an `UnavailableProvider` and every stage using it
/// degrades with the construction error as its cause.
pub fn create_provider(config: &LlmConfig) -> Arc<dyn LlmProvider> {
    match OpenAiCompatibleProvider::new(config) {
        Ok(provider) => {
            tracing::info!(
                provider = %config.provider,
                model = %config.model,
                "Completion provider ready"
            );
            Arc::new(provider)
        }
        Err(e) => {
            tracing::warn!(
                provider = %config.provider,
                model = %config.model,
                error = %e,
                "Completion provider unavailable; dependent stages will degrade"
            );
            Arc::new(UnavailableProvider::new(config.model.clone(), e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_errors() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(&fast_retry(3), || async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(LlmError::Connection {
                    message: "reset".into(),
                })
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_retry(3), || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::AuthFailed {
                provider: "openai".into(),
            })
        })
        .await;
        assert!(matches!(result, Err(LlmError::AuthFailed { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_retry(2), || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::EmptyResponse)
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig {
            max_retries: 10,
            initial_backoff_ms: 500,
            max_backoff_ms: 2_000,
            backoff_multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(compute_exponential_backoff(&config, 0), 500);
        assert_eq!(compute_exponential_backoff(&config, 1), 1_000);
        assert_eq!(compute_exponential_backoff(&config, 5), 2_000);
    }

    #[test]
    fn test_backoff_respects_retry_after() {
        let config = fast_retry(1);
        let err = LlmError::RateLimited {
            retry_after_secs: 3,
        };
        assert_eq!(compute_backoff(&config, 0, &err), 3_000);
    }

    #[tokio::test]
    async fn test_unavailable_provider_fails_every_call() {
        let provider = UnavailableProvider::new(
            "gpt-4o",
            LlmError::AuthFailed {
                provider: "openai".into(),
            },
        );
        assert!(!provider.is_available());
        let err = provider
            .complete(CompletionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::AuthFailed { .. }));
    }

    #[test]
    fn test_create_provider_without_key_is_unavailable() {
        let mut config = LlmConfig::analysis_default();
        config.api_key_env = "PAPERLAB_TEST_KEY_THAT_IS_NEVER_SET".into();
        let provider = create_provider(&config);
        assert!(!provider.is_available());
        assert_eq!(provider.model_name(), "gpt-4o");
    }
}
