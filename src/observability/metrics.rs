//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_admission_total` (counter): pipeline decisions by outcome
//! - `gateway_token_validation_total` (counter): authority calls by result
//! - `gateway_fallback_total` (counter): canned responses by service
//! - `gateway_circuit_state` (gauge): 0=closed, 1=half-open, 2=open

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape listener. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, elapsed: Duration) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_admission(outcome: &'static str) {
    counter!("gateway_admission_total", "outcome" => outcome).increment(1);
}

pub fn record_token_validation(result: &'static str) {
    counter!("gateway_token_validation_total", "result" => result).increment(1);
}

pub fn record_fallback(service: &'static str) {
    counter!("gateway_fallback_total", "service" => service).increment(1);
}

pub fn record_circuit_state(name: &str, value: f64) {
    gauge!("gateway_circuit_state", "name" => name.to_string()).set(value);
}
