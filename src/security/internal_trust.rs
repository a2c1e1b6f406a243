//! Service-to-service trust.
//!
//! An internal caller asserts its identity with three headers:
//! `X-Service-Request: true`, `X-Service-Name: <service>` and
//! `X-Service-Token: <shared secret>`. The assertion holds only when the
//! flag is exactly `true`, the service is on the allow-list and the secret
//! matches. [`TrustPolicy`] is the one place that decision is made; the
//! trust stage and the authentication stage both ask it.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::config::TrustConfig;
use crate::http::request::{
    header_str, X_GATEWAY_SERVICE, X_GATEWAY_VALIDATED, X_INTERNAL_REQUEST, X_SERVICE_NAME,
    X_SERVICE_REQUEST, X_SERVICE_TOKEN, X_SOURCE_SERVICE,
};
use crate::pipeline::{RequestContext, Stage, StageOutcome};

/// An accepted internal-trust assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAssertion {
    pub service: String,
}

/// Allow-list and shared secret for internal callers.
#[derive(Debug, Clone)]
pub struct TrustPolicy {
    secret: String,
    trusted: HashSet<String>,
    gateway: String,
}

impl TrustPolicy {
    pub fn new(config: &TrustConfig, gateway: &str) -> Self {
        Self {
            secret: config.service_token.clone(),
            trusted: config.trusted_services.iter().cloned().collect(),
            gateway: gateway.to_string(),
        }
    }

    pub fn is_trusted(&self, service: &str) -> bool {
        self.trusted.contains(service)
    }

    /// Check the trust headers. `None` means the request is treated as an
    /// ordinary end-user request.
    pub fn evaluate(&self, headers: &HeaderMap, request_id: &str) -> Option<TrustAssertion> {
        if header_str(headers, &X_SERVICE_REQUEST) != Some("true") {
            return None;
        }
        let service = header_str(headers, &X_SERVICE_NAME)?;
        let token = header_str(headers, &X_SERVICE_TOKEN)?;

        if !self.is_trusted(service) {
            tracing::warn!(request_id = %request_id, service = %service, "Untrusted service attempted internal access");
            return None;
        }
        if !bool::from(token.as_bytes().ct_eq(self.secret.as_bytes())) {
            tracing::warn!(
                request_id = %request_id,
                service = %service,
                token = %mask(token),
                "Invalid service token presented"
            );
            return None;
        }

        Some(TrustAssertion {
            service: service.to_string(),
        })
    }

    /// Mark the request as internally sourced and pre-authenticated.
    pub fn grant(&self, ctx: &mut RequestContext, assertion: TrustAssertion) {
        tracing::debug!(
            request_id = %ctx.request_id(),
            service = %assertion.service,
            path = %ctx.path(),
            "Internal service request authorized"
        );
        ctx.set_header(X_GATEWAY_VALIDATED, "true");
        ctx.set_header(X_INTERNAL_REQUEST, "true");
        ctx.set_header(X_SOURCE_SERVICE, &assertion.service);
        ctx.set_header(X_GATEWAY_SERVICE, &self.gateway);
        ctx.grant_trust(assertion);
    }
}

/// First four characters followed by a mask.
fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}****")
}

/// First stage: grants the auth bypass to trusted internal callers. Never
/// rejects.
pub struct InternalTrustStage {
    policy: Arc<TrustPolicy>,
}

impl InternalTrustStage {
    pub fn new(policy: Arc<TrustPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Stage for InternalTrustStage {
    fn name(&self) -> &'static str {
        "internal-trust"
    }

    async fn apply(&self, ctx: &mut RequestContext) -> StageOutcome {
        if let Some(assertion) = self.policy.evaluate(ctx.original_headers(), ctx.request_id()) {
            self.policy.grant(ctx, assertion);
        }
        StageOutcome::Continue
    }
}
