//! Authentication stage.
//!
//! Checks run in a fixed order and the first conclusive one wins:
//!
//! 1. trust already granted by the internal-trust stage → allow
//! 2. `X-Skip-Auth: true` → allow
//! 3. a valid internal-trust assertion on this request → allow
//! 4. public route (prefix match) → allow
//! 5. no `Authorization: Bearer <token>` → 401
//! 6. authority says valid → enrich with identity headers, allow;
//!    authority says invalid → 401
//! 7. authority unreachable → 503 with `Retry-After`
//!
//! Step 6 is the only await point in the pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;

use crate::authority::{IdentityClaims, TokenValidator, ValidationOutcome};
use crate::http::request::{
    header_str, is_true, X_GATEWAY_SERVICE, X_GATEWAY_VALIDATED, X_SKIP_AUTH, X_USER_EMAIL,
    X_USER_ID, X_USER_PROGRAMS, X_USER_ROLE,
};
use crate::pipeline::{Rejection, RequestContext, Stage, StageOutcome};
use crate::security::internal_trust::TrustPolicy;
use crate::security::public_routes::PublicRouteSet;

const BEARER_PREFIX: &str = "Bearer ";

pub struct AuthenticationStage {
    policy: Arc<TrustPolicy>,
    public_routes: PublicRouteSet,
    validator: Arc<dyn TokenValidator>,
    gateway: String,
}

impl AuthenticationStage {
    pub fn new(
        policy: Arc<TrustPolicy>,
        public_routes: PublicRouteSet,
        validator: Arc<dyn TokenValidator>,
        gateway: &str,
    ) -> Self {
        Self {
            policy,
            public_routes,
            validator,
            gateway: gateway.to_string(),
        }
    }

    fn enrich(&self, ctx: &mut RequestContext, claims: IdentityClaims) {
        if let Some(user_id) = &claims.user_id {
            ctx.set_header(X_USER_ID, user_id);
        }
        if let Some(email) = &claims.email {
            ctx.set_header(X_USER_EMAIL, email);
        }
        if let Some(role) = &claims.role {
            ctx.set_header(X_USER_ROLE, role);
        }
        if let Some(programs) = claims.programs_header() {
            ctx.set_header(X_USER_PROGRAMS, &programs);
        }
        ctx.set_header(X_GATEWAY_VALIDATED, "true");
        ctx.set_header(X_GATEWAY_SERVICE, &self.gateway);
        ctx.set_identity(claims);
    }
}

/// Token from an `Authorization: Bearer <token>` value.
pub fn bearer_token(value: Option<&str>) -> Option<&str> {
    value?
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl Stage for AuthenticationStage {
    fn name(&self) -> &'static str {
        "authentication"
    }

    async fn apply(&self, ctx: &mut RequestContext) -> StageOutcome {
        if ctx.skip_auth() {
            tracing::debug!(request_id = %ctx.request_id(), "Skipping authentication for trusted internal request");
            return StageOutcome::Allow;
        }

        if is_true(header_str(ctx.original_headers(), &X_SKIP_AUTH)) {
            tracing::debug!(request_id = %ctx.request_id(), path = %ctx.path(), "Skipping authentication on explicit header");
            return StageOutcome::Allow;
        }

        if let Some(assertion) = self.policy.evaluate(ctx.original_headers(), ctx.request_id()) {
            self.policy.grant(ctx, assertion);
            return StageOutcome::Allow;
        }

        if let Some(prefix) = self.public_routes.matching(ctx.path()) {
            tracing::debug!(request_id = %ctx.request_id(), path = %ctx.path(), prefix = %prefix, "Public route");
            return StageOutcome::Allow;
        }

        let token = match bearer_token(header_str(ctx.original_headers(), &AUTHORIZATION)) {
            Some(token) => token.to_string(),
            None => {
                tracing::warn!(request_id = %ctx.request_id(), path = %ctx.path(), "Missing or invalid Authorization header");
                return StageOutcome::Deny(Rejection::authentication_required());
            }
        };

        match self.validator.validate(&token).await {
            ValidationOutcome::Valid(claims) => {
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    user_id = ?claims.user_id,
                    role = ?claims.role,
                    "Authenticated request"
                );
                self.enrich(ctx, claims);
                StageOutcome::Allow
            }
            ValidationOutcome::Invalid(claims) => {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    path = %ctx.path(),
                    reason = ?claims.error,
                    "Invalid token"
                );
                StageOutcome::Deny(Rejection::invalid_token())
            }
            ValidationOutcome::Unavailable(claims) => {
                tracing::error!(
                    request_id = %ctx.request_id(),
                    path = %ctx.path(),
                    reason = ?claims.error,
                    "Authentication service unavailable"
                );
                StageOutcome::Deny(Rejection::authority_unavailable())
            }
        }
    }
}
