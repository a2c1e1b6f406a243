use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use serde::Serialize;

use crate::admin::AdminState;
use crate::http::response::TIMESTAMP_FORMAT;
use crate::resilience::BreakerSnapshot;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerChange {
    pub message: String,
    pub new_state: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerFailure {
    pub error: String,
    pub circuit_breaker: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetAllSummary {
    pub total_reset: usize,
    pub details: BTreeMap<String, String>,
    pub timestamp: String,
}

fn now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

fn unknown(name: &str, action: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(BreakerFailure {
            error: format!("Failed to {action} circuit breaker"),
            circuit_breaker: name.to_string(),
            reason: format!("no circuit breaker named '{name}'"),
        }),
    )
        .into_response()
}

pub async fn get_status(State(state): State<AdminState>) -> Json<BTreeMap<String, BreakerSnapshot>> {
    Json(
        state
            .breakers
            .all()
            .into_iter()
            .map(|b| (b.name().to_string(), b.snapshot()))
            .collect(),
    )
}

pub async fn reset_breaker(State(state): State<AdminState>, Path(name): Path<String>) -> Response {
    let Some(breaker) = state.breakers.get(&name) else {
        return unknown(&name, "reset");
    };
    breaker.reset();
    tracing::info!(breaker = %name, "Circuit breaker reset via admin API");
    Json(BreakerChange {
        message: format!("Circuit breaker '{name}' reset successfully"),
        new_state: breaker.state().to_string(),
        timestamp: now(),
    })
    .into_response()
}

pub async fn open_breaker(State(state): State<AdminState>, Path(name): Path<String>) -> Response {
    let Some(breaker) = state.breakers.get(&name) else {
        return unknown(&name, "open");
    };
    breaker.force_open();
    tracing::warn!(breaker = %name, "Circuit breaker opened via admin API");
    Json(BreakerChange {
        message: format!("Circuit breaker '{name}' opened manually"),
        new_state: breaker.state().to_string(),
        timestamp: now(),
    })
    .into_response()
}

pub async fn reset_all(State(state): State<AdminState>) -> Json<ResetAllSummary> {
    let mut details = BTreeMap::new();
    for breaker in state.breakers.all() {
        breaker.reset();
        details.insert(breaker.name().to_string(), "RESET_SUCCESS".to_string());
    }
    tracing::info!(count = details.len(), "All circuit breakers reset via admin API");
    Json(ResetAllSummary {
        total_reset: details.len(),
        details,
        timestamp: now(),
    })
}
