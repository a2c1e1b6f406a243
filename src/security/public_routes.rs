//! Paths exempt from token validation.

use crate::routing::PathPrefixMatcher;

/// Static set of public path prefixes.
///
/// Membership is prefix-only: `/api/users/health` is not public just
/// because `/health` is.
#[derive(Debug, Clone, Default)]
pub struct PublicRouteSet {
    prefixes: Vec<PathPrefixMatcher>,
}

impl PublicRouteSet {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(PathPrefixMatcher::new).collect(),
        }
    }

    /// The matching prefix, if any.
    pub fn matching(&self, path: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|m| m.matches(path))
            .map(PathPrefixMatcher::prefix)
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.matching(path).is_some()
    }
}
