//! Correlation stage.
//!
//! Assigns every request a short id and a start time, echoes both on the
//! response whatever the outcome, and writes the completion log line with
//! the elapsed time. Requests slower than the configured threshold get an
//! extra warning. Runs as the outermost middleware so handler panics are
//! also caught here and rendered as an error envelope.

use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Local};
use futures_util::FutureExt;
use uuid::Uuid;

use crate::config::CorrelationConfig;
use crate::error::GatewayError;
use crate::http::request::{client_address, X_GATEWAY_TIMESTAMP, X_REQUEST_ID};
use crate::http::response::ErrorResponder;
use crate::observability::metrics;

const REQUEST_ID_LEN: usize = 8;

/// Identity and timing of one request.
#[derive(Debug, Clone)]
pub struct Correlation {
    id: String,
    started: Instant,
    started_at: DateTime<Local>,
}

impl Correlation {
    /// Fresh id, clock started now.
    pub fn start() -> Self {
        Self {
            id: new_request_id(),
            started: Instant::now(),
            started_at: Local::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Start time as sent in `X-Gateway-Timestamp`.
    pub fn started_at(&self) -> String {
        self.started_at.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
    }
}

/// First eight hex digits of a v4 UUID.
pub fn new_request_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(REQUEST_ID_LEN);
    id
}

/// State for [`correlation_middleware`].
#[derive(Debug, Clone)]
pub struct CorrelationSettings {
    pub slow_threshold: Duration,
    pub responder: ErrorResponder,
}

impl CorrelationSettings {
    pub fn new(config: &CorrelationConfig, responder: ErrorResponder) -> Self {
        Self {
            slow_threshold: Duration::from_millis(config.slow_request_threshold_ms),
            responder,
        }
    }

    /// Strictly slower than the threshold.
    pub fn is_slow(&self, elapsed: Duration) -> bool {
        elapsed > self.slow_threshold
    }
}

pub async fn correlation_middleware(
    State(settings): State<CorrelationSettings>,
    mut request: Request,
    next: Next,
) -> Response {
    let correlation = Correlation::start();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let client = client_address(request.headers(), peer);

    tracing::info!(
        request_id = %correlation.id(),
        method = %method,
        path = %path,
        client = %client,
        "Request received"
    );

    request.extensions_mut().insert(correlation.clone());

    let mut response = match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            let err = GatewayError::Unexpected(panic_message(panic.as_ref()));
            settings.responder.failure(&err, &path, Some(correlation.id()))
        }
    };

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(correlation.id()) {
        headers.insert(X_REQUEST_ID, value);
    }
    if let Ok(value) = HeaderValue::from_str(&correlation.started_at()) {
        headers.insert(X_GATEWAY_TIMESTAMP, value);
    }

    let elapsed = correlation.elapsed();
    let duration_ms = elapsed.as_millis() as u64;
    let status = response.status();

    if status.is_server_error() {
        tracing::error!(
            request_id = %correlation.id(),
            method = %method,
            path = %path,
            client = %client,
            status = status.as_u16(),
            duration_ms,
            "Request failed"
        );
    } else {
        tracing::info!(
            request_id = %correlation.id(),
            method = %method,
            path = %path,
            client = %client,
            status = status.as_u16(),
            duration_ms,
            "Request completed"
        );
    }

    if settings.is_slow(elapsed) {
        tracing::warn!(
            request_id = %correlation.id(),
            path = %path,
            duration_ms,
            threshold_ms = settings.slow_threshold.as_millis() as u64,
            "Slow request"
        );
    }

    metrics::record_request(method.as_str(), status.as_u16(), elapsed);
    response
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
