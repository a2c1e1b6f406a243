//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a failed attempt may be repeated
//! - Repeat with a fixed delay, up to a bounded number of extra attempts
//!
//! # Design Decisions
//! - The error type decides retryability (authoritative rejections never retry)
//! - Fixed delay, no jitter: the authority sees at most `1 + max_retries` calls
//! - Dropping the returned future abandons any pending retry

use std::future::Future;
use std::time::Duration;

/// Errors that know whether repeating the call can help.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Total number of attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts are used up. `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts() => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts(),
                        delay_ms = self.delay.as_millis() as u64,
                        error = %err,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
