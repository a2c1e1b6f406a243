//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! RequestContext
//!     → internal_trust.rs (grant the bypass to trusted services, never rejects)
//!     → authentication.rs (skip checks, public routes, bearer validation)
//!     → Admitted or a terminal 401/503
//! ```
//!
//! # Design Decisions
//! - One trust policy shared by both stages
//! - Public routes are prefix matches only
//! - No trust in client input: identity headers are always gateway-written

pub mod authentication;
pub mod internal_trust;
pub mod public_routes;

pub use authentication::AuthenticationStage;
pub use internal_trust::{InternalTrustStage, TrustAssertion, TrustPolicy};
pub use public_routes::PublicRouteSet;
