//! Per-request state shared by the admission stages.
//!
//! Created once the correlation id exists, owned by the task serving the
//! request, dropped when the response is sent.

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::authority::IdentityClaims;
use crate::http::request::strip_gateway_asserted;
use crate::pipeline::correlation::Correlation;
use crate::security::internal_trust::TrustAssertion;

#[derive(Debug)]
pub struct RequestContext {
    correlation: Correlation,
    method: Method,
    path: String,
    client: String,
    /// Headers exactly as the client sent them.
    original_headers: HeaderMap,
    /// Headers that will be forwarded; stages rewrite these.
    headers: HeaderMap,
    /// Accepted internal-trust assertion; its presence is the auth bypass.
    trust: Option<TrustAssertion>,
    identity: Option<IdentityClaims>,
}

impl RequestContext {
    pub fn new(
        correlation: Correlation,
        method: Method,
        path: impl Into<String>,
        headers: HeaderMap,
        client: impl Into<String>,
    ) -> Self {
        let mut outbound = headers.clone();
        strip_gateway_asserted(&mut outbound);
        Self {
            correlation,
            method,
            path: path.into(),
            client: client.into(),
            original_headers: headers,
            headers: outbound,
            trust: None,
            identity: None,
        }
    }

    pub fn request_id(&self) -> &str {
        self.correlation.id()
    }

    pub fn correlation(&self) -> &Correlation {
        &self.correlation
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn client(&self) -> &str {
        &self.client
    }

    pub fn original_headers(&self) -> &HeaderMap {
        &self.original_headers
    }

    /// Outbound headers as rewritten so far.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Set an outbound header; values that are not valid header text are dropped.
    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(v) => {
                self.headers.insert(name, v);
            }
            Err(_) => {
                tracing::warn!(request_id = %self.request_id(), header = %name, "Dropping invalid header value");
            }
        }
    }

    /// True once an internal-trust assertion has been accepted.
    pub fn skip_auth(&self) -> bool {
        self.trust.is_some()
    }

    pub fn trust(&self) -> Option<&TrustAssertion> {
        self.trust.as_ref()
    }

    pub fn grant_trust(&mut self, assertion: TrustAssertion) {
        self.trust = Some(assertion);
    }

    pub fn identity(&self) -> Option<&IdentityClaims> {
        self.identity.as_ref()
    }

    pub fn set_identity(&mut self, claims: IdentityClaims) {
        self.identity = Some(claims);
    }

    /// Consume the context, yielding the headers to forward.
    pub fn into_headers(self) -> HeaderMap {
        self.headers
    }

    #[cfg(test)]
    pub(crate) fn for_test(path: &str) -> Self {
        Self::with_headers(path, HeaderMap::new())
    }

    #[cfg(test)]
    pub(crate) fn with_headers(path: &str, headers: HeaderMap) -> Self {
        Self::new(Correlation::start(), Method::GET, path, headers, "127.0.0.1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::{X_GATEWAY_VALIDATED, X_USER_ID};

    #[test]
    fn test_client_identity_headers_never_reach_outbound() {
        let mut headers = HeaderMap::new();
        headers.insert(X_USER_ID, HeaderValue::from_static("someone-else"));
        headers.insert(X_GATEWAY_VALIDATED, HeaderValue::from_static("true"));
        let ctx = RequestContext::with_headers("/api/x", headers);

        assert!(ctx.original_headers().get(X_USER_ID).is_some());
        assert!(ctx.headers().get(X_USER_ID).is_none());
        assert!(ctx.headers().get(X_GATEWAY_VALIDATED).is_none());
        assert!(!ctx.skip_auth());
    }

    #[test]
    fn test_invalid_header_value_is_dropped() {
        let mut ctx = RequestContext::for_test("/api/x");
        ctx.set_header(X_USER_ID, "line\nbreak");
        assert!(ctx.headers().get(X_USER_ID).is_none());
        ctx.set_header(X_USER_ID, "42");
        assert_eq!(ctx.headers()[X_USER_ID], "42");
    }
}
