//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Admitted request (path)
//!     → router.rs (route lookup, backend group)
//!     → matcher.rs (prefix test)
//!     → Return: matched Route or None
//!
//! Route Compilation (at startup):
//!     RouteConfig[] + BackendGroupConfig[]
//!     → Sort by priority, then prefix length
//!     → Freeze as immutable RouteTable
//! ```

pub mod matcher;
pub mod router;

pub use matcher::PathPrefixMatcher;
pub use router::{BackendGroup, Route, RouteTable};
