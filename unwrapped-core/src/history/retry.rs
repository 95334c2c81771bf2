//! Bounded retry with linear backoff for history requests.

use std::time::Duration;

use crate::error::{Error, FetchError, Result};
use crate::source::{HistoryRequest, MessageSource};
use crate::types::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Wait before retry `n` is `backoff * n`
    pub backoff: Duration,
    /// Ceiling for a single rate-limit wait
    pub max_rate_limit_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(500),
            max_rate_limit_wait: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Wait before the retry that follows failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: usize, error: &FetchError) -> Duration {
        let linear = self
            .backoff
            .saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX));
        match error {
            FetchError::RateLimited { retry_after } => retry_after
                .unwrap_or_default()
                .max(linear)
                .min(self.max_rate_limit_wait),
            _ => linear,
        }
    }
}

/// Issue `request` until it succeeds, fails fatally, or the retry budget runs out.
///
/// The request is re-issued unchanged; the cursor never advances on failure.
pub async fn fetch_with_retry(
    source: &dyn MessageSource,
    request: &HistoryRequest,
    policy: &RetryPolicy,
) -> Result<Vec<Message>> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match source.fetch_history(request).await {
            Ok(page) => return Ok(page),
            Err(e) if !e.is_retryable() => return Err(Error::Fetch(e)),
            Err(e) if attempt > policy.max_retries => {
                return Err(Error::RetriesExhausted {
                    attempts: attempt,
                    last: e,
                })
            }
            Err(e) => {
                let delay = policy.delay_for(attempt, &e);
                tracing::warn!(
                    offset_date = request.offset_date,
                    offset_id = request.offset_id,
                    "History fetch failed (attempt {}/{}), retrying in {:?}: {}",
                    attempt,
                    policy.max_retries + 1,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
