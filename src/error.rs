//! Gateway failure taxonomy.
//!
//! Every failure raised after admission (routing, forwarding, handler
//! faults) is expressed as a [`GatewayError`] and rendered into the
//! canonical error body by [`crate::http::response::ErrorResponder`].

use std::error::Error as StdError;
use std::io;

/// A failure anywhere in the pipeline or on the way to a backend.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Malformed or illegal client input.
    #[error("{0}")]
    InvalidInput(String),

    /// The backend refused the connection.
    #[error("connection refused by {0}")]
    ConnectionRefused(String),

    /// The backend did not answer within the deadline.
    #[error("timed out waiting for {0}")]
    Timeout(String),

    /// The backend name could not be resolved.
    #[error("unable to resolve {0}")]
    UnknownHost(String),

    /// The backend group's circuit is open and no fallback is registered.
    #[error("circuit open for backend group {0}")]
    CircuitOpen(String),

    /// Uncategorized failure raised by gateway code.
    #[error("{0}")]
    Internal(String),

    /// A fault that escaped normal handling (e.g. a panic).
    #[error("{0}")]
    Unexpected(String),
}

impl GatewayError {
    /// Build the "resource absent" flavour of an internal error.
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        GatewayError::Internal(format!("{what} not found"))
    }

    /// True when the message carries the "not found" marker.
    pub fn mentions_not_found(&self) -> bool {
        self.to_string().to_lowercase().contains("not found")
    }

    /// Classify a transport error from the upstream client.
    ///
    /// Walks the `source()` chain looking for an I/O error kind or a
    /// resolver failure; anything unrecognised stays `Internal`.
    pub fn from_upstream(err: &(dyn StdError + 'static), target: &str) -> Self {
        let mut current: Option<&(dyn StdError + 'static)> = Some(err);
        while let Some(e) = current {
            if let Some(io_err) = e.downcast_ref::<io::Error>() {
                match io_err.kind() {
                    io::ErrorKind::ConnectionRefused => {
                        return GatewayError::ConnectionRefused(target.to_string())
                    }
                    io::ErrorKind::TimedOut => return GatewayError::Timeout(target.to_string()),
                    _ => {}
                }
            }
            let text = e.to_string().to_lowercase();
            if text.contains("dns error") || text.contains("failed to lookup address") {
                return GatewayError::UnknownHost(target.to_string());
            }
            current = e.source();
        }
        GatewayError::Internal(format!("upstream request to {target} failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Wrapper(io::Error);

    impl std::fmt::Display for Wrapper {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "client error (Connect)")
        }
    }

    impl StdError for Wrapper {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_classifies_refused_connection_through_source_chain() {
        let err = Wrapper(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        let classified = GatewayError::from_upstream(&err, "orion-user");
        assert!(matches!(classified, GatewayError::ConnectionRefused(t) if t == "orion-user"));
    }

    #[test]
    fn test_classifies_dns_failure_as_unknown_host() {
        let err = Wrapper(io::Error::new(io::ErrorKind::Other, "dns error: failed to lookup address"));
        let classified = GatewayError::from_upstream(&err, "nowhere:80");
        assert!(matches!(classified, GatewayError::UnknownHost(_)));
    }

    #[test]
    fn test_unrecognised_failure_stays_internal() {
        let err = Wrapper(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        let classified = GatewayError::from_upstream(&err, "orion-user");
        assert!(matches!(classified, GatewayError::Internal(_)));
    }

    #[test]
    fn test_not_found_marker() {
        assert!(GatewayError::not_found("route for /nope").mentions_not_found());
        assert!(GatewayError::Internal("Document NOT FOUND".into()).mentions_not_found());
        assert!(!GatewayError::Internal("boom".into()).mentions_not_found());
    }
}
