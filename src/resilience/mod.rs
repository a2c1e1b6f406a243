//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the authentication authority:
//!     → circuit_breaker.rs (fail fast while the authority is known down)
//!     → retries.rs (fixed-delay retry of transient failures only)
//!     → timeouts.rs (deadline on every attempt)
//!
//! Call to a backend group:
//!     → circuit_breaker.rs (open circuit hands the request to the fallback responder)
//!     → timeouts.rs (backend request deadline)
//! ```
//!
//! # Design Decisions
//! - Every outbound call has a deadline
//! - Retries only for connection-level faults and timeouts
//! - Breakers are per backend group, plus one for the authority

pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitBreakerRegistry, CircuitState};
pub use retries::{RetryPolicy, Retryable};
pub use timeouts::{deadline, DeadlineExceeded};
