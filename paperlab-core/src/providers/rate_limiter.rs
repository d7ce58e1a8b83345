//! Client-side minimum-interval rate limiter for outbound provider calls.
//!
//! One limiter is shared (via `Arc`) by every pipeline worker that talks to the
//! same provider. The last-call timestamp lives behind an async mutex that is
//! held across the wait, so concurrent callers queue up and each observes the
//! timestamp written by its predecessor.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Enforces a minimum elapsed time between consecutive calls.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter that spaces calls at least `min_interval` apart.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a call is allowed, then record it as issued now.
    ///
    /// Returns how long the caller was held back.
    pub async fn acquire(&self) -> Duration {
        let mut last = self.last_call.lock().await;
        let wait = last
            .map(|t| self.min_interval.saturating_sub(t.elapsed()))
            .unwrap_or_default();

        if !wait.is_zero() {
            tracing::trace!(wait_ms = wait.as_millis() as u64, "Rate limiting outbound call");
            tokio::time::sleep(wait).await;
        }

        *last = Some(Instant::now());
        wait
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

/// Parse Retry-After header from HTTP 429 responses.
///
/// Supports both seconds (numeric) and fractional-second (`"0.5s"`) formats.
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let value = headers
        .get("retry-after")
        .or_else(|| headers.get("x-ratelimit-reset-requests"))
        .or_else(|| headers.get("x-ratelimit-reset-tokens"))
        .and_then(|v| v.to_str().ok())?;

    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    if let Some(stripped) = value.strip_suffix('s')
        && let Ok(secs) = stripped.parse::<f64>()
    {
        return Some(Duration::from_secs_f64(secs));
    }

    // Fall back to a conservative 5 second delay
    Some(Duration::from_secs(5))
}
