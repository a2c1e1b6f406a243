//! Local stand-ins for the token authority and one backend.
//!
//! Run with `cargo run --example mock_services`, then start the gateway
//! with `--config demos/gateway.toml`:
//!
//! ```text
//! curl -H 'Authorization: Bearer demo-token' localhost:8080/api/users/me
//! ```

use axum::{
    http::{header::AUTHORIZATION, HeaderMap},
    routing::{any, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;

async fn validate(headers: HeaderMap) -> Json<Value> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();

    if token == "demo-token" {
        Json(json!({
            "valid": true,
            "userId": 1,
            "email": "demo@example.edu",
            "role": "STUDENT",
            "programs": ["SYS"]
        }))
    } else {
        Json(json!({ "valid": false, "error": "unknown token" }))
    }
}

async fn backend(headers: HeaderMap) -> Json<Value> {
    let pick = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    Json(json!({
        "service": "orion-user",
        "requestId": pick("x-request-id"),
        "userId": pick("x-user-id"),
        "role": pick("x-user-role"),
        "sourceService": pick("x-source-service"),
    }))
}

#[tokio::main]
async fn main() {
    let authority = Router::new().route("/auth/validate", post(validate));
    let users = Router::new()
        .route("/", any(backend))
        .route("/{*path}", any(backend));

    let authority_addr = SocketAddr::from(([127, 0, 0, 1], 8091));
    let users_addr = SocketAddr::from(([127, 0, 0, 1], 8092));
    println!("Mock authority listening on http://{}", authority_addr);
    println!("Mock user service listening on http://{}", users_addr);

    let authority_listener = tokio::net::TcpListener::bind(authority_addr).await.unwrap();
    let users_listener = tokio::net::TcpListener::bind(users_addr).await.unwrap();

    let _ = tokio::join!(
        axum::serve(authority_listener, authority),
        axum::serve(users_listener, users),
    );
}
