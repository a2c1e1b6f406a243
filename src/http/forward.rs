//! Forwarding of admitted requests.
//!
//! # Responsibilities
//! - Resolve the route and backend group for the request path
//! - Consult the group's circuit breaker (open → fallback or 503)
//! - Send the rewritten request to the next instance with a deadline
//! - Classify transport failures into [`GatewayError`]s
//!
//! # Design Decisions
//! - No retries towards backends; the breaker is the only protection
//! - 502/503/504 from a backend count as breaker failures, the response
//!   itself is still relayed
//! - Response bodies stream through untouched

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{
        header::{self, HeaderName},
        uri::{Authority, PathAndQuery, Scheme},
        HeaderValue, Request, StatusCode, Uri, Version,
    },
    response::Response,
};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::error::GatewayError;
use crate::http::fallback::FallbackResponder;
use crate::http::request::X_REQUEST_ID;
use crate::pipeline::RequestContext;
use crate::resilience::{deadline, CircuitBreakerRegistry};
use crate::routing::RouteTable;

/// Hop-by-hop headers never forwarded.
const HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    routes: RouteTable,
    breakers: Arc<CircuitBreakerRegistry>,
    fallback: FallbackResponder,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(
        routes: RouteTable,
        breakers: Arc<CircuitBreakerRegistry>,
        fallback: FallbackResponder,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            routes,
            breakers,
            fallback,
            timeout,
        }
    }

    /// Send an admitted request to its backend group.
    pub async fn forward(
        &self,
        ctx: RequestContext,
        uri: Uri,
        version: Version,
        body: Body,
    ) -> Result<Response, GatewayError> {
        let path = ctx.path().to_string();
        let request_id = ctx.request_id().to_string();

        let route = self
            .routes
            .match_path(&path)
            .ok_or_else(|| GatewayError::not_found(format!("route for {path}")))?;
        let group = self.routes.group(&route.backend_group).ok_or_else(|| {
            GatewayError::Internal(format!("backend group {} is not configured", route.backend_group))
        })?;

        let breaker = self.breakers.get_or_create(group.name());
        if !breaker.try_acquire() {
            return match group.fallback() {
                Some(service) => Ok(self.fallback.respond(
                    service,
                    ctx.method().as_str(),
                    &path,
                    Some(&request_id),
                )),
                None => Err(GatewayError::CircuitOpen(group.name().to_string())),
            };
        }

        let instance = group
            .next_instance()
            .ok_or_else(|| GatewayError::ConnectionRefused(format!("{} (no instances)", group.name())))?
            .to_string();

        tracing::debug!(
            request_id = %request_id,
            route = %route.name,
            backend = %instance,
            "Forwarding request"
        );

        let method = ctx.method().clone();
        let mut headers = ctx.into_headers();
        for name in HOP_BY_HOP.iter() {
            headers.remove(name);
        }
        headers.remove(header::HOST);
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            headers.insert(X_REQUEST_ID, value);
        }

        let target = upstream_uri(&uri, &instance)?;
        let mut request = Request::new(body);
        *request.method_mut() = method;
        *request.uri_mut() = target;
        *request.version_mut() = match version {
            Version::HTTP_2 => Version::HTTP_11,
            other => other,
        };
        *request.headers_mut() = headers;

        match deadline(self.timeout, self.client.request(request)).await {
            Err(expired) => {
                breaker.record_failure();
                tracing::warn!(request_id = %request_id, backend = %instance, error = %expired, "Backend timed out");
                Err(GatewayError::Timeout(instance))
            }
            Ok(Err(err)) => {
                breaker.record_failure();
                tracing::warn!(request_id = %request_id, backend = %instance, error = %err, "Upstream error");
                Err(GatewayError::from_upstream(&err, &instance))
            }
            Ok(Ok(response)) => {
                if is_backend_failure(response.status()) {
                    breaker.record_failure();
                } else {
                    breaker.record_success();
                }
                Ok(relay(response))
            }
        }
    }
}

/// Statuses that say the backend itself is unhealthy.
fn is_backend_failure(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Hand the backend response to the client with its body streaming through.
fn relay(response: hyper::Response<Incoming>) -> Response {
    let (mut parts, body) = response.into_parts();
    for name in HOP_BY_HOP.iter() {
        parts.headers.remove(name);
    }
    Response::from_parts(parts, Body::new(body))
}

/// The request URI re-pointed at `instance` over plain HTTP.
fn upstream_uri(uri: &Uri, instance: &str) -> Result<Uri, GatewayError> {
    let authority = Authority::from_str(instance)
        .map_err(|e| GatewayError::Internal(format!("invalid backend address {instance}: {e}")))?;
    let path_and_query = uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));
    Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(authority)
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| GatewayError::Internal(format!("invalid upstream uri: {e}")))
}
