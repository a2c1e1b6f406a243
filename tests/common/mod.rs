//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    routing::{any, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use orion_gateway::config::{BackendGroupConfig, GatewayConfig, RouteConfig};
use orion_gateway::http::fallback::BackendService;
use orion_gateway::lifecycle::Shutdown;
use orion_gateway::HttpServer;

pub const SERVICE_TOKEN: &str = "integration-secret";
pub const ADMIN_KEY: &str = "integration-admin-key";

/// How the mock authority answers.
#[derive(Clone)]
pub enum Authority {
    /// 200 with this claim map.
    Answer(Value),
    /// Bare status code, empty JSON body.
    Status(u16),
    /// Sleep this long before answering valid.
    Hang(Duration),
}

impl Authority {
    pub fn valid_user() -> Self {
        Authority::Answer(json!({
            "valid": true,
            "userId": "u-17",
            "email": "ana@example.edu",
            "role": "PROFESSOR",
            "programs": ["SYS", "ELEC"]
        }))
    }
}

#[derive(Clone)]
struct AuthorityState {
    behavior: Authority,
    calls: Arc<AtomicUsize>,
}

async fn authority_handler(State(state): State<AuthorityState>) -> (StatusCode, Json<Value>) {
    state.calls.fetch_add(1, Ordering::SeqCst);
    match state.behavior {
        Authority::Answer(body) => (StatusCode::OK, Json(body)),
        Authority::Status(code) => (
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(json!({})),
        ),
        Authority::Hang(delay) => {
            tokio::time::sleep(delay).await;
            (StatusCode::OK, Json(json!({"valid": true})))
        }
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a mock token authority; returns its validation URL and call counter.
pub async fn start_mock_authority(behavior: Authority) -> (String, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/auth/validate", post(authority_handler))
        .with_state(AuthorityState {
            behavior,
            calls: calls.clone(),
        });
    let addr = serve(app).await;
    (format!("http://{addr}/auth/validate"), calls)
}

async fn echo_handler(State(hits): State<Arc<AtomicUsize>>, request: Request) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    let headers: BTreeMap<String, String> = request
        .headers()
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect();
    Json(json!({
        "method": request.method().as_str(),
        "path": request.uri().path(),
        "headers": headers,
    }))
}

/// Start a backend that echoes the request head as JSON.
pub async fn start_echo_backend() -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/", any(echo_handler))
        .route("/{*path}", any(echo_handler))
        .with_state(hits.clone());
    (serve(app).await, hits)
}

/// Start a programmable mock backend speaking raw HTTP/1.1.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            504 => "504 Gateway Timeout",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Gateway config pointed at `authority_url`, routing `/api` to `backend`.
pub fn gateway_config(authority_url: &str, backend: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.trust.service_token = SERVICE_TOKEN.into();
    config.authority.validation_url = authority_url.into();
    config.authority.timeout_ms = 200;
    config.authority.retry_delay_ms = 20;
    config.observability.metrics_enabled = false;
    config.admin.enabled = true;
    config.admin.api_key = ADMIN_KEY.into();
    config.circuit_breaker.failure_threshold = 2;
    config.circuit_breaker.open_secs = 60;
    config.routes.push(RouteConfig {
        name: "users".into(),
        path_prefix: "/api".into(),
        backend_group: "orion-user".into(),
        priority: 0,
    });
    config.backend_groups.push(BackendGroupConfig {
        name: "orion-user".into(),
        instances: vec![backend.to_string()],
        fallback: Some(BackendService::User),
    });
    config
}

/// A running gateway; dropping it leaves the server task running until
/// `shutdown` is triggered.
pub struct Gateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl Gateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_gateway(config: GatewayConfig) -> Gateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).expect("gateway should build");
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    Gateway { addr, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
