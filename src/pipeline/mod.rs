//! Request admission pipeline.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → correlation.rs (id + start time, echoed on every response, completion log)
//!     → RequestContext built from the request head
//!     → stages, in order:
//!         security::internal_trust   (may grant the auth bypass, never rejects)
//!         security::authentication   (allow or deny; the only await point)
//!     → Admitted: hand the rewritten head to the proxy layer
//!     → Denied:   terminal envelope response, backend never contacted
//! ```
//!
//! # Design Decisions
//! - Stages are an explicit ordered list driven by a loop
//! - Each stage returns Continue, Allow (skip the rest) or Deny
//! - Per-request attributes are typed fields on the context, not a string map

pub mod context;
pub mod correlation;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;

use crate::http::response::ErrorKind;
use crate::observability::metrics;

pub use context::RequestContext;
pub use correlation::{Correlation, CorrelationSettings};

/// Seconds a client should wait after the authority was unreachable.
pub const AUTHORITY_RETRY_AFTER_SECS: u64 = 30;

/// Why a request was refused before reaching a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub kind: ErrorKind,
    pub message: String,
    pub retry_after_secs: Option<u64>,
}

impl Rejection {
    /// No usable `Authorization: Bearer` header.
    pub fn authentication_required() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            kind: ErrorKind::AuthenticationRequired,
            message: "Authentication required".to_string(),
            retry_after_secs: None,
        }
    }

    /// The authority rejected the token.
    pub fn invalid_token() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            kind: ErrorKind::AuthenticationRequired,
            message: "Invalid or expired token".to_string(),
            retry_after_secs: None,
        }
    }

    /// The authority could not be reached.
    pub fn authority_unavailable() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            kind: ErrorKind::ServiceUnavailable,
            message: "Authentication service unavailable".to_string(),
            retry_after_secs: Some(AUTHORITY_RETRY_AFTER_SECS),
        }
    }
}

/// Result of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Hand the request to the next stage.
    Continue,
    /// Admit the request now; later stages are skipped.
    Allow,
    /// Refuse the request with a terminal response.
    Deny(Rejection),
}

/// Result of the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Denied(Rejection),
}

/// One step of the admission pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    async fn apply(&self, ctx: &mut RequestContext) -> StageOutcome;
}

/// Ordered list of stages.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage; stages run in insertion order.
    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run the stages against `ctx` until one allows or denies.
    pub async fn admit(&self, ctx: &mut RequestContext) -> Admission {
        for stage in &self.stages {
            match stage.apply(ctx).await {
                StageOutcome::Continue => continue,
                StageOutcome::Allow => {
                    tracing::debug!(request_id = %ctx.request_id(), stage = stage.name(), "Request admitted");
                    metrics::record_admission("allowed");
                    return Admission::Admitted;
                }
                StageOutcome::Deny(rejection) => {
                    tracing::debug!(
                        request_id = %ctx.request_id(),
                        stage = stage.name(),
                        status = rejection.status.as_u16(),
                        "Request denied"
                    );
                    metrics::record_admission("denied");
                    return Admission::Denied(rejection);
                }
            }
        }
        metrics::record_admission("allowed");
        Admission::Admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        outcome: StageOutcome,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(name: &'static str, outcome: StageOutcome) -> Arc<Self> {
            Arc::new(Self {
                name,
                outcome,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Stage for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn apply(&self, _ctx: &mut RequestContext) -> StageOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    #[tokio::test]
    async fn test_allow_short_circuits_later_stages() {
        let first = Fixed::new("first", StageOutcome::Allow);
        let second = Fixed::new("second", StageOutcome::Deny(Rejection::invalid_token()));
        let pipeline = Pipeline::new().with_stage(first.clone()).with_stage(second.clone());

        let mut ctx = RequestContext::for_test("/api/x");
        assert_eq!(pipeline.admit(&mut ctx).await, Admission::Admitted);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deny_is_terminal() {
        let first = Fixed::new("first", StageOutcome::Continue);
        let second = Fixed::new("second", StageOutcome::Deny(Rejection::authentication_required()));
        let third = Fixed::new("third", StageOutcome::Allow);
        let pipeline = Pipeline::new()
            .with_stage(first.clone())
            .with_stage(second)
            .with_stage(third.clone());

        let mut ctx = RequestContext::for_test("/api/x");
        assert_eq!(
            pipeline.admit(&mut ctx).await,
            Admission::Denied(Rejection::authentication_required())
        );
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(third.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_continue_admits() {
        let pipeline = Pipeline::new().with_stage(Fixed::new("only", StageOutcome::Continue));
        let mut ctx = RequestContext::for_test("/api/x");
        assert_eq!(pipeline.admit(&mut ctx).await, Admission::Admitted);
        assert_eq!(pipeline.stage_names(), vec!["only"]);
    }
}
