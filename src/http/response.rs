//! Error-response construction.
//!
//! # Responsibilities
//! - Map any [`GatewayError`] to a (status, kind, message) triple
//! - Build the canonical JSON error envelope
//! - Never fail while rendering: a hand-built body replaces serde output
//!   if serialization errors
//!
//! # Design Decisions
//! - 5xx messages are fixed strings; failure detail only reaches the logs
//! - Every error response echoes the correlation id ("unknown" if absent)

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use chrono::Local;
use serde::Serialize;

use crate::error::GatewayError;
use crate::http::request::{X_AUTH_ERROR, X_ERROR_HANDLER, X_REQUEST_ID};
use crate::pipeline::Rejection;

/// Wire format of the envelope timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Value of `X-Error-Handler` on responses built from a [`GatewayError`].
pub const ERROR_HANDLER_NAME: &str = "Gateway-Global";

const UNKNOWN_REQUEST_ID: &str = "unknown";

/// The `error` tag of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationError,
    NotFound,
    AuthenticationRequired,
    ServiceUnavailable,
    GatewayTimeout,
    BadGateway,
    InternalError,
    UnexpectedError,
    SerializationError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            ErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorKind::GatewayTimeout => "GATEWAY_TIMEOUT",
            ErrorKind::BadGateway => "BAD_GATEWAY",
            ErrorKind::InternalError => "INTERNAL_ERROR",
            ErrorKind::UnexpectedError => "UNEXPECTED_ERROR",
            ErrorKind::SerializationError => "SERIALIZATION_ERROR",
        }
    }
}

/// Canonical error body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error: String,
    pub message: String,
    pub timestamp: String,
    pub path: String,
    pub status: u16,
    pub request_id: String,
    pub gateway: String,
}

impl ErrorEnvelope {
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        path: &str,
        status: StatusCode,
        request_id: Option<&str>,
        gateway: &str,
    ) -> Self {
        Self {
            error: kind.as_str().to_string(),
            message: message.into(),
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            path: path.to_string(),
            status: status.as_u16(),
            request_id: request_id.unwrap_or(UNKNOWN_REQUEST_ID).to_string(),
            gateway: gateway.to_string(),
        }
    }

    /// Serialize with serde, falling back to the fixed-format body.
    pub fn to_json(&self) -> String {
        self.to_json_with(serde_json::to_string)
    }

    /// Serialize with `serialize`; on error log it and emit [`Self::fallback_json`].
    pub fn to_json_with<F>(&self, serialize: F) -> String
    where
        F: FnOnce(&Self) -> Result<String, serde_json::Error>,
    {
        match serialize(self) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(request_id = %self.request_id, error = %e, "Error serializing error response");
                self.fallback_json()
            }
        }
    }

    /// Hand-built body carrying every required field.
    pub fn fallback_json(&self) -> String {
        format!(
            "{{\"error\":\"{}\",\"message\":\"Error processing gateway response\",\"timestamp\":\"{}\",\"path\":\"{}\",\"status\":{},\"requestId\":\"{}\",\"gateway\":\"{}\"}}",
            ErrorKind::SerializationError.as_str(),
            escape_json(&self.timestamp),
            escape_json(&self.path),
            self.status,
            escape_json(&self.request_id),
            escape_json(&self.gateway),
        )
    }
}

fn escape_json(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Status, kind and client-facing message for a failure.
pub fn classify(err: &GatewayError) -> (StatusCode, ErrorKind, String) {
    match err {
        GatewayError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, ErrorKind::ValidationError, msg.clone()),
        GatewayError::ConnectionRefused(_) | GatewayError::CircuitOpen(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::ServiceUnavailable,
            "Service temporarily unavailable. Please try again later.".to_string(),
        ),
        GatewayError::Timeout(_) => (
            StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::GatewayTimeout,
            "Gateway timeout. The service is taking too long to respond.".to_string(),
        ),
        GatewayError::UnknownHost(_) => (
            StatusCode::BAD_GATEWAY,
            ErrorKind::BadGateway,
            "Bad gateway. Unable to connect to the downstream service.".to_string(),
        ),
        GatewayError::Internal(_) if err.mentions_not_found() => (
            StatusCode::NOT_FOUND,
            ErrorKind::NotFound,
            "The requested resource was not found".to_string(),
        ),
        GatewayError::Internal(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::InternalError,
            "An unexpected error occurred. Please try again later.".to_string(),
        ),
        GatewayError::Unexpected(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::UnexpectedError,
            "Something went wrong. Please try again later.".to_string(),
        ),
    }
}

/// Terminal handler turning failures and denials into envelope responses.
#[derive(Debug, Clone)]
pub struct ErrorResponder {
    gateway: Arc<str>,
}

impl ErrorResponder {
    pub fn new(gateway: &str) -> Self {
        Self {
            gateway: Arc::from(gateway),
        }
    }

    pub fn gateway(&self) -> &str {
        &self.gateway
    }

    /// Render a raised failure.
    pub fn failure(&self, err: &GatewayError, path: &str, request_id: Option<&str>) -> Response {
        let (status, kind, message) = classify(err);
        let rid = request_id.unwrap_or(UNKNOWN_REQUEST_ID);

        if status == StatusCode::BAD_REQUEST {
            tracing::warn!(request_id = %rid, path = %path, error = %err, "Validation error");
        } else if status == StatusCode::NOT_FOUND {
            tracing::warn!(request_id = %rid, path = %path, error = %err, "Resource not found");
        } else if status.is_server_error() {
            tracing::error!(request_id = %rid, path = %path, error = ?err, "Internal gateway error");
        } else {
            tracing::error!(request_id = %rid, path = %path, error = ?err, "Unexpected gateway error");
        }

        let envelope = ErrorEnvelope::new(kind, message, path, status, request_id, &self.gateway);
        let mut response = envelope_response(&envelope, status);
        response
            .headers_mut()
            .insert(X_ERROR_HANDLER, HeaderValue::from_static(ERROR_HANDLER_NAME));
        response
    }

    /// Render a pipeline denial.
    pub fn rejection(&self, rejection: &Rejection, path: &str, request_id: Option<&str>) -> Response {
        let envelope = ErrorEnvelope::new(
            rejection.kind,
            rejection.message.clone(),
            path,
            rejection.status,
            request_id,
            &self.gateway,
        );
        let mut response = envelope_response(&envelope, rejection.status);
        let headers = response.headers_mut();
        if rejection.kind == ErrorKind::AuthenticationRequired {
            if let Ok(value) = HeaderValue::from_str(&rejection.message) {
                headers.insert(X_AUTH_ERROR, value);
            }
        }
        if let Some(secs) = rejection.retry_after_secs {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// JSON response carrying `envelope` with the correlation header set.
pub fn envelope_response(envelope: &ErrorEnvelope, status: StatusCode) -> Response {
    let mut response = Response::new(Body::from(envelope.to_json()));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(value) = HeaderValue::from_str(&envelope.request_id) {
        headers.insert(X_REQUEST_ID, value);
    }
    response
}
