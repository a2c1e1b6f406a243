//! Circuit breaker for backend and authority protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: target assumed down, requests fail fast
//! - Half-Open: testing if the target recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold, or windowed error rate >= threshold
//! Open → Half-Open: after the open interval
//! Half-Open → Closed: success_threshold probe successes
//! Half-Open → Open: any probe failure
//! ```
//!
//! # Design Decisions
//! - One breaker per backend group, plus one for the token authority
//! - Breakers live in a registry so the admin endpoints can inspect them
//! - Forced-open breakers stay open until reset

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;

use crate::config::CircuitBreakerConfig;
use crate::http::response::TIMESTAMP_FORMAT;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }

    fn gauge_value(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct BreakerState {
    current: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    forced: bool,
    /// Sliding window: true = success, false = failure
    window: VecDeque<bool>,
    last_updated: DateTime<Local>,
}

/// Point-in-time view of one breaker, shaped for the admin API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    pub state: String,
    pub failure_rate: String,
    pub buffered_calls: usize,
    pub failed_calls: usize,
    pub successful_calls: usize,
    pub last_updated: String,
}

pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: RwLock<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(BreakerState {
                current: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
                forced: false,
                window: VecDeque::with_capacity(config.window_size),
                last_updated: Local::now(),
            }),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.state.read().current
    }

    /// Returns false while the circuit is open. Moves Open → HalfOpen once
    /// the open interval has elapsed.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.write();
        match state.current {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                if state.forced {
                    return false;
                }
                let open_for = Duration::from_secs(self.config.open_secs);
                match state.opened_at {
                    Some(opened_at) if opened_at.elapsed() >= open_for => {
                        tracing::info!(breaker = %self.name, "Circuit breaker: Open → HalfOpen");
                        self.transition(&mut state, CircuitState::HalfOpen);
                        state.consecutive_successes = 0;
                        state.consecutive_failures = 0;
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.write();
        state.consecutive_successes += 1;
        state.consecutive_failures = 0;
        self.push_window(&mut state, true);

        if state.current == CircuitState::HalfOpen
            && state.consecutive_successes >= self.config.success_threshold
        {
            tracing::info!(breaker = %self.name, "Circuit breaker: HalfOpen → Closed");
            // Start the closed period with a clean history.
            state.window.clear();
            state.consecutive_successes = 0;
            state.consecutive_failures = 0;
            state.opened_at = None;
            self.transition(&mut state, CircuitState::Closed);
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.state.write();
        state.consecutive_failures += 1;
        state.consecutive_successes = 0;
        self.push_window(&mut state, false);

        match state.current {
            CircuitState::Closed => {
                let error_rate = error_rate(&state.window);
                let window_full = state.window.len() >= self.config.window_size;
                if state.consecutive_failures >= self.config.failure_threshold
                    || (window_full && error_rate >= self.config.error_rate_threshold)
                {
                    tracing::warn!(
                        breaker = %self.name,
                        failures = state.consecutive_failures,
                        error_rate = error_rate * 100.0,
                        "Circuit breaker: Closed → Open"
                    );
                    self.trip(&mut state);
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!(breaker = %self.name, "Circuit breaker: HalfOpen → Open (probe failed)");
                self.trip(&mut state);
            }
            CircuitState::Open => {}
        }
    }

    /// Back to Closed with cleared counters.
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.consecutive_failures = 0;
        state.consecutive_successes = 0;
        state.opened_at = None;
        state.forced = false;
        state.window.clear();
        self.transition(&mut state, CircuitState::Closed);
    }

    /// Open the circuit until an explicit reset.
    pub fn force_open(&self) {
        let mut state = self.state.write();
        self.trip(&mut state);
        state.forced = true;
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state.read();
        let failed = state.window.iter().filter(|ok| !**ok).count();
        BreakerSnapshot {
            state: state.current.to_string(),
            failure_rate: format!("{:.1}%", error_rate(&state.window) * 100.0),
            buffered_calls: state.window.len(),
            failed_calls: failed,
            successful_calls: state.window.len() - failed,
            last_updated: state.last_updated.format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    fn trip(&self, state: &mut BreakerState) {
        state.opened_at = Some(Instant::now());
        self.transition(state, CircuitState::Open);
    }

    fn transition(&self, state: &mut BreakerState, next: CircuitState) {
        state.current = next;
        state.last_updated = Local::now();
        metrics::record_circuit_state(&self.name, next.gauge_value());
    }

    fn push_window(&self, state: &mut BreakerState, success: bool) {
        if state.window.len() >= self.config.window_size {
            state.window.pop_front();
        }
        state.window.push_back(success);
        state.last_updated = Local::now();
    }
}

fn error_rate(window: &VecDeque<bool>) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let failures = window.iter().filter(|ok| !**ok).count();
    failures as f64 / window.len() as f64
}

/// Named breakers shared between the proxy layer, the authority client and
/// the admin endpoints.
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Fetch the breaker for `name`, creating it on first use.
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.clone();
        }
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.config.clone())))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|b| b.clone())
    }

    pub fn all(&self) -> Vec<Arc<CircuitBreaker>> {
        let mut all: Vec<_> = self.breakers.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }
}
