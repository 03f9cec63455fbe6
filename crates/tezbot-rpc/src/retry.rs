//! Retries for one-shot node requests.
//!
//! Only transient node failures are retried: transport errors, `429` and
//! `5xx` (see [`ChainError::is_retryable`]). A `404` for a block that does not
//! exist yet, or a body that fails to decode, is returned on the first try.
//!
//! The n-th retry waits `base_delay * 2^(n-1)`, never more than `max_delay`.

use std::future::Future;
use std::time::Duration;

use tezbot_core::error::ChainError;

/// How hard to insist on a single request.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Tries per request, the first one included. `0` and `1` both mean a
    /// single try.
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 4,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Outcome of a failed try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Sleep this long, then try again.
    Retry(Duration),
    /// Return the error to the caller.
    GiveUp,
}

#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Decide what follows try number `attempt` (1-based) failing with `err`.
    pub fn verdict(&self, attempt: u32, err: &ChainError) -> Verdict {
        if !err.is_retryable() || attempt >= self.config.attempts {
            return Verdict::GiveUp;
        }
        Verdict::Retry(self.backoff(attempt))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.config
            .base_delay
            .saturating_mul(factor)
            .min(self.config.max_delay)
    }

    /// Drive `call` until it succeeds or the verdict is to give up. `what`
    /// names the request in logs.
    pub async fn run<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T, ChainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            match self.verdict(attempt, &err) {
                Verdict::Retry(delay) => {
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        request = what,
                        "retrying node request"
                    );
                    tokio::time::sleep(delay).await;
                }
                Verdict::GiveUp => {
                    if err.is_retryable() {
                        tracing::error!(attempt, error = %err, request = what, "node request failed");
                    }
                    return Err(err);
                }
            }
        }
    }
}
