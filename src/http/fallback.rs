//! Canned responses for unavailable backends.
//!
//! # Responsibilities
//! - One 503 envelope per logical backend service
//! - Mark the response with `X-Fallback-Triggered` and a long `Retry-After`
//! - Serve the same responses on `/fallback/{service}` for callers that
//!   redirect there explicitly
//!
//! The proxy layer decides when a backend is unavailable; this module only
//! knows what to answer.

use axum::{
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    response::Response,
    routing::any,
    Router,
};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::http::request::X_FALLBACK_TRIGGERED;
use crate::http::response::{envelope_response, ErrorEnvelope, ErrorKind, ErrorResponder};
use crate::observability::metrics;
use crate::pipeline::Correlation;

/// Seconds a client should wait before retrying an unavailable backend.
pub const FALLBACK_RETRY_AFTER_SECS: u64 = 300;

/// Logical backend services with a registered fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendService {
    User,
    Auth,
    Program,
    Document,
    Storage,
}

impl BackendService {
    pub const ALL: [BackendService; 5] = [
        BackendService::User,
        BackendService::Auth,
        BackendService::Program,
        BackendService::Document,
        BackendService::Storage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendService::User => "user",
            BackendService::Auth => "auth",
            BackendService::Program => "program",
            BackendService::Document => "document",
            BackendService::Storage => "storage",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BackendService::User => "User",
            BackendService::Auth => "Authentication",
            BackendService::Program => "Program",
            BackendService::Document => "Document",
            BackendService::Storage => "Storage",
        }
    }

    /// Service named by a `/fallback/<segment>` path; `drive` is an alias
    /// for storage.
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "drive" => Some(BackendService::Storage),
            other => Self::ALL.into_iter().find(|s| s.as_str() == other),
        }
    }

    pub fn unavailable_message(&self) -> String {
        format!("{} service is temporarily unavailable", self.display_name())
    }
}

/// Builds the canned 503 for a service.
#[derive(Debug, Clone)]
pub struct FallbackResponder {
    responder: ErrorResponder,
}

impl FallbackResponder {
    pub fn new(responder: ErrorResponder) -> Self {
        Self { responder }
    }

    pub fn respond(
        &self,
        service: BackendService,
        method: &str,
        path: &str,
        request_id: Option<&str>,
    ) -> Response {
        let message = service.unavailable_message();
        tracing::warn!(
            request_id = request_id.unwrap_or("unknown"),
            method = %method,
            path = %path,
            service = service.as_str(),
            reason = %message,
            "Fallback triggered"
        );
        metrics::record_fallback(service.as_str());

        let envelope = ErrorEnvelope::new(
            ErrorKind::ServiceUnavailable,
            message,
            path,
            StatusCode::SERVICE_UNAVAILABLE,
            request_id,
            self.responder.gateway(),
        );
        let mut response = envelope_response(&envelope, StatusCode::SERVICE_UNAVAILABLE);
        let headers = response.headers_mut();
        headers.insert(X_FALLBACK_TRIGGERED, HeaderValue::from_static("true"));
        headers.insert(header::RETRY_AFTER, HeaderValue::from(FALLBACK_RETRY_AFTER_SECS));
        response
    }

    async fn handle(self, request: Request) -> Response {
        let path = request.uri().path().to_string();
        let request_id = request
            .extensions()
            .get::<Correlation>()
            .map(|c| c.id().to_string());
        let segment = path
            .strip_prefix("/fallback/")
            .and_then(|rest| rest.split('/').next())
            .unwrap_or_default();

        match BackendService::from_segment(segment) {
            Some(service) => self.respond(service, request.method().as_str(), &path, request_id.as_deref()),
            None => self.responder.failure(
                &GatewayError::not_found(format!("fallback for service '{segment}'")),
                &path,
                request_id.as_deref(),
            ),
        }
    }
}

/// `/fallback/{service}` routes, any method.
pub fn fallback_router(responder: FallbackResponder) -> Router {
    let nested = responder.clone();
    Router::new()
        .route(
            "/fallback/{service}",
            any(move |request: Request| responder.clone().handle(request)),
        )
        .route(
            "/fallback/{service}/{*rest}",
            any(move |request: Request| nested.clone().handle(request)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::X_REQUEST_ID;
    use axum::body::Body;
    use tower::ServiceExt;

    fn responder() -> FallbackResponder {
        FallbackResponder::new(ErrorResponder::new("orion-gateway"))
    }

    async fn json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_segments() {
        assert_eq!(BackendService::from_segment("user"), Some(BackendService::User));
        assert_eq!(BackendService::from_segment("drive"), Some(BackendService::Storage));
        assert_eq!(BackendService::from_segment("storage"), Some(BackendService::Storage));
        assert_eq!(BackendService::from_segment("billing"), None);
    }

    #[tokio::test]
    async fn test_canned_response_shape() {
        let response = responder().respond(BackendService::Document, "GET", "/api/documents/1", Some("ab12cd34"));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[X_FALLBACK_TRIGGERED], "true");
        assert_eq!(response.headers()[header::RETRY_AFTER], "300");
        assert_eq!(response.headers()[X_REQUEST_ID], "ab12cd34");

        let body = json(response).await;
        assert_eq!(body["error"], "SERVICE_UNAVAILABLE");
        assert_eq!(body["message"], "Document service is temporarily unavailable");
        assert_eq!(body["status"], 503);
        assert_eq!(body["path"], "/api/documents/1");
    }

    #[tokio::test]
    async fn test_fallback_routes() {
        let app = fallback_router(responder());

        let response = app
            .clone()
            .oneshot(axum::http::Request::builder().uri("/fallback/drive/files/9").method("POST").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json(response).await["message"], "Storage service is temporarily unavailable");

        let response = app
            .oneshot(axum::http::Request::builder().uri("/fallback/billing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(response).await["requestId"], "unknown");
    }
}
