//! Circuit-breaker admin endpoints.
//!
//! Mounted only when `admin.enabled`; they sit outside the admission
//! pipeline and are guarded by the admin API key instead.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::http::response::ErrorResponder;
use crate::resilience::CircuitBreakerRegistry;
use self::auth::admin_auth_middleware;
use self::handlers::*;

#[derive(Clone)]
pub struct AdminState {
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub api_key: Arc<str>,
    pub responder: ErrorResponder,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/circuit-breaker/status", get(get_status))
        .route("/admin/circuit-breaker/reset/{name}", post(reset_breaker))
        .route("/admin/circuit-breaker/open/{name}", post(open_breaker))
        .route("/admin/circuit-breaker/reset-all", post(reset_all))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
