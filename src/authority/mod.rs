//! Remote token-validation authority.
//!
//! # Data Flow
//! ```text
//! Bearer token
//!     → client.rs (breaker check, concurrency cap, POST with deadline + retry)
//!     → types.rs (claim map → IdentityClaims)
//!     → ValidationOutcome: Valid | Invalid | Unavailable
//! ```

pub mod client;
pub mod types;

pub use client::{AuthorityClient, CallError, TokenValidator, AUTHORITY_BREAKER};
pub use types::{IdentityClaims, ValidationOutcome};
