//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap outbound calls with a deadline
//! - Report expiry as a distinct error
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the inner future is dropped on expiry
//! - Timed-out backend calls surface as 504 Gateway Timeout

use std::future::Future;
use std::time::Duration;

/// The deadline elapsed before the wrapped call finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deadline of {limit_ms}ms exceeded")]
pub struct DeadlineExceeded {
    pub limit_ms: u64,
}

/// Run `fut` to completion or fail once `limit` has elapsed.
pub async fn deadline<F, T>(limit: Duration, fut: F) -> Result<T, DeadlineExceeded>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| DeadlineExceeded {
            limit_ms: limit.as_millis() as u64,
        })
}
