//! Request-side header vocabulary and helpers.
//!
//! # Responsibilities
//! - Name every header the gateway reads or writes
//! - Derive the client address from forwarding headers
//! - Strip identity headers a client must not be able to forge

use std::net::SocketAddr;

use axum::http::{HeaderMap, HeaderName};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_GATEWAY_TIMESTAMP: HeaderName = HeaderName::from_static("x-gateway-timestamp");
pub const X_GATEWAY_VALIDATED: HeaderName = HeaderName::from_static("x-gateway-validated");
pub const X_GATEWAY_SERVICE: HeaderName = HeaderName::from_static("x-gateway-service");
pub const X_INTERNAL_REQUEST: HeaderName = HeaderName::from_static("x-internal-request");
pub const X_SOURCE_SERVICE: HeaderName = HeaderName::from_static("x-source-service");
pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub const X_USER_EMAIL: HeaderName = HeaderName::from_static("x-user-email");
pub const X_USER_ROLE: HeaderName = HeaderName::from_static("x-user-role");
pub const X_USER_PROGRAMS: HeaderName = HeaderName::from_static("x-user-programs");
pub const X_AUTH_ERROR: HeaderName = HeaderName::from_static("x-auth-error");
pub const X_FALLBACK_TRIGGERED: HeaderName = HeaderName::from_static("x-fallback-triggered");
pub const X_ERROR_HANDLER: HeaderName = HeaderName::from_static("x-error-handler");

pub const X_SKIP_AUTH: HeaderName = HeaderName::from_static("x-skip-auth");
pub const X_SERVICE_REQUEST: HeaderName = HeaderName::from_static("x-service-request");
pub const X_SERVICE_NAME: HeaderName = HeaderName::from_static("x-service-name");
pub const X_SERVICE_TOKEN: HeaderName = HeaderName::from_static("x-service-token");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

/// Headers only the gateway may set on the way downstream.
pub const GATEWAY_ASSERTED_HEADERS: [HeaderName; 8] = [
    X_GATEWAY_VALIDATED,
    X_GATEWAY_SERVICE,
    X_INTERNAL_REQUEST,
    X_SOURCE_SERVICE,
    X_USER_ID,
    X_USER_EMAIL,
    X_USER_ROLE,
    X_USER_PROGRAMS,
];

/// First value of `name` as a string, if present and visible ASCII.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Case-insensitive `"true"` check used for the explicit skip header.
pub fn is_true(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

/// Client address: X-Forwarded-For (first hop), then X-Real-IP, then the peer.
pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = header_str(headers, &X_FORWARDED_FOR).filter(|v| !v.is_empty()) {
        if let Some(first) = forwarded.split(',').next() {
            return first.trim().to_string();
        }
    }
    if let Some(real_ip) = header_str(headers, &X_REAL_IP).filter(|v| !v.is_empty()) {
        return real_ip.trim().to_string();
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Remove every gateway-asserted header from a client-supplied set.
pub fn strip_gateway_asserted(headers: &mut HeaderMap) {
    for name in GATEWAY_ASSERTED_HEADERS.iter() {
        headers.remove(name);
    }
}
