//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, correlation layer, gateway handler)
//!     → request.rs (header vocabulary, client address)
//!     → [admission pipeline]
//!     → forward.rs (route, breaker, upstream call)
//!     → response.rs (error envelopes) / fallback.rs (canned 503s)
//!     → Send to client
//! ```

pub mod fallback;
pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{HttpServer, ServerError};
