//! Orion gateway library.
//!
//! Request-admission layer for a microservice gateway: correlation ids,
//! internal service trust, bearer-token validation against a remote
//! authority, uniform error envelopes, and a thin forwarding layer with
//! per-backend circuit breakers and canned fallbacks.

pub mod admin;
pub mod authority;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
