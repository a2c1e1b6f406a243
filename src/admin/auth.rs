use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::admin::AdminState;
use crate::http::request::header_str;
use crate::http::response::ErrorKind;
use crate::pipeline::{Correlation, Rejection};
use crate::security::authentication::bearer_token;

/// Require `Authorization: Bearer <admin api key>`.
pub async fn admin_auth_middleware(
    State(state): State<AdminState>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = bearer_token(header_str(request.headers(), &AUTHORIZATION))
        .is_some_and(|key| bool::from(key.as_bytes().ct_eq(state.api_key.as_bytes())));

    if authorized {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    let request_id = request
        .extensions()
        .get::<Correlation>()
        .map(|c| c.id().to_string());
    tracing::warn!(request_id = ?request_id, path = %path, "Rejected admin request");

    let rejection = Rejection {
        status: StatusCode::UNAUTHORIZED,
        kind: ErrorKind::AuthenticationRequired,
        message: "Admin API key required".to_string(),
        retry_after_secs: None,
    };
    state.responder.rejection(&rejection, &path, request_id.as_deref())
}
