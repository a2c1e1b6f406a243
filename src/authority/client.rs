//! Token-validation client.
//!
//! # Responsibilities
//! - POST the bearer token to the authority and read its claim map
//! - Bound every attempt with a deadline
//! - Retry timeouts and transport failures with a fixed delay
//! - Never retry an authoritative rejection
//! - Cap concurrent calls (waiting for a slot is bounded by the attempt deadline)
//!   and fail fast while the authority's circuit is open
//!
//! # Design Decisions
//! - `validate` never returns an error: every path ends in a [`ValidationOutcome`]
//! - A 4xx answer proves the authority is up, so it counts as a breaker success
//! - Dropping the future abandons the in-flight attempt and any pending retry

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::Semaphore;

use crate::authority::types::{IdentityClaims, ValidationOutcome};
use crate::config::AuthorityConfig;
use crate::observability::metrics;
use crate::resilience::{deadline, CircuitBreaker, DeadlineExceeded, RetryPolicy, Retryable};

/// Breaker name the authority client registers under.
pub const AUTHORITY_BREAKER: &str = "auth-authority";

/// Anything that can turn a bearer token into a validation outcome.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> ValidationOutcome;
}

/// Why a single attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    Timeout(#[from] DeadlineExceeded),

    #[error("transport error: {0}")]
    Transport(String),

    /// 4xx from the authority; the token itself was refused.
    #[error("authority rejected the token with HTTP {0}")]
    Rejected(u16),

    #[error("authority answered HTTP {0}")]
    Status(u16),

    #[error("undecodable authority response: {0}")]
    Decode(String),
}

impl Retryable for CallError {
    fn is_retryable(&self) -> bool {
        matches!(self, CallError::Timeout(_) | CallError::Transport(_))
    }
}

/// HTTP client for the remote authority.
pub struct AuthorityClient {
    http: reqwest::Client,
    url: String,
    attempt_timeout: Duration,
    retry: RetryPolicy,
    max_response_bytes: usize,
    permits: Semaphore,
    breaker: Arc<CircuitBreaker>,
}

impl AuthorityClient {
    pub fn new(config: &AuthorityConfig, breaker: Arc<CircuitBreaker>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self {
            http,
            url: config.validation_url.clone(),
            attempt_timeout: Duration::from_millis(config.timeout_ms),
            retry: RetryPolicy::new(config.max_retries, Duration::from_millis(config.retry_delay_ms)),
            max_response_bytes: config.max_response_bytes,
            permits: Semaphore::new(config.max_concurrency),
            breaker,
        })
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    async fn attempt(&self, token: &str, attempt: u32) -> Result<IdentityClaims, CallError> {
        tracing::debug!(url = %self.url, attempt, "Validating token with authority");
        deadline(self.attempt_timeout, self.call(token)).await?
    }

    async fn call(&self, token: &str) -> Result<IdentityClaims, CallError> {
        let mut response = self
            .http
            .post(&self.url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| CallError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(CallError::Rejected(status.as_u16()));
        }
        if !status.is_success() {
            return Err(CallError::Status(status.as_u16()));
        }
        if response
            .content_length()
            .is_some_and(|len| len > self.max_response_bytes as u64)
        {
            return Err(CallError::Decode("response body too large".into()));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| CallError::Transport(e.to_string()))?
        {
            if body.len() + chunk.len() > self.max_response_bytes {
                return Err(CallError::Decode("response body too large".into()));
            }
            body.extend_from_slice(&chunk);
        }

        let value: serde_json::Value =
            serde_json::from_slice(&body).map_err(|e| CallError::Decode(e.to_string()))?;
        if !value.is_object() {
            return Err(CallError::Decode("expected a JSON object".into()));
        }
        Ok(IdentityClaims::from_authority(&value))
    }
}

#[async_trait]
impl TokenValidator for AuthorityClient {
    async fn validate(&self, token: &str) -> ValidationOutcome {
        if !self.breaker.try_acquire() {
            tracing::warn!(breaker = AUTHORITY_BREAKER, "Authority circuit open, skipping validation call");
            metrics::record_token_validation("circuit_open");
            return ValidationOutcome::Unavailable(IdentityClaims::failed(
                "Authentication service circuit open",
            ));
        }

        let _permit = match deadline(self.attempt_timeout, self.permits.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                metrics::record_token_validation("unavailable");
                return ValidationOutcome::Unavailable(IdentityClaims::failed(
                    "Token validation failed",
                ));
            }
            Err(expired) => {
                tracing::warn!(error = %expired, "No validation slot free, authority saturated");
                metrics::record_token_validation("saturated");
                return ValidationOutcome::Unavailable(IdentityClaims::failed(
                    "Authentication service busy",
                ));
            }
        };

        let outcome = match self.retry.run(|attempt| self.attempt(token, attempt)).await {
            Ok(claims) => {
                self.breaker.record_success();
                tracing::debug!(user_id = ?claims.user_id, valid = claims.valid, "Token validation answered");
                ValidationOutcome::from_claims(claims)
            }
            Err(CallError::Rejected(status)) => {
                self.breaker.record_success();
                tracing::debug!(status, "Token rejected by authority");
                ValidationOutcome::Invalid(IdentityClaims::failed("Token rejected by authority"))
            }
            Err(err) => {
                self.breaker.record_failure();
                tracing::warn!(error = %err, "Token validation failed");
                ValidationOutcome::Unavailable(IdentityClaims::failed("Token validation failed"))
            }
        };
        metrics::record_token_validation(outcome.label());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    struct Mock {
        calls: Arc<AtomicUsize>,
        delay: Duration,
        status: StatusCode,
        body: Value,
    }

    async fn handler(State(mock): State<Mock>) -> (StatusCode, Json<Value>) {
        mock.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(mock.delay).await;
        (mock.status, Json(mock.body.clone()))
    }

    async fn spawn(mock: Mock) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/auth/validate", post(handler)).with_state(mock);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/auth/validate")
    }

    fn mock(status: StatusCode, body: Value, delay: Duration) -> (Mock, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Mock {
                calls: calls.clone(),
                delay,
                status,
                body,
            },
            calls,
        )
    }

    fn client(url: String) -> AuthorityClient {
        let config = AuthorityConfig {
            validation_url: url,
            timeout_ms: 100,
            max_retries: 2,
            retry_delay_ms: 10,
            ..AuthorityConfig::default()
        };
        let breaker = Arc::new(CircuitBreaker::new(AUTHORITY_BREAKER, CircuitBreakerConfig::default()));
        AuthorityClient::new(&config, breaker).unwrap()
    }

    #[tokio::test]
    async fn test_valid_token_yields_claims() {
        let (m, calls) = mock(
            StatusCode::OK,
            json!({"valid": true, "userId": "u1", "email": "u1@example.edu", "role": "ADMIN"}),
            Duration::ZERO,
        );
        let outcome = client(spawn(m).await).validate("abc").await;
        match outcome {
            ValidationOutcome::Valid(claims) => assert_eq!(claims.user_id.as_deref(), Some("u1")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_valid_false_is_invalid_without_retry() {
        let (m, calls) = mock(StatusCode::OK, json!({"valid": false, "error": "expired"}), Duration::ZERO);
        let outcome = client(spawn(m).await).validate("abc").await;
        assert!(matches!(outcome, ValidationOutcome::Invalid(_)));
        assert_eq!(outcome.claims().error.as_deref(), Some("expired"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let (m, calls) = mock(StatusCode::UNAUTHORIZED, json!({"error": "bad"}), Duration::ZERO);
        let outcome = client(spawn(m).await).validate("abc").await;
        assert!(matches!(outcome, ValidationOutcome::Invalid(_)));
        assert!(!outcome.claims().valid);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeouts_are_retried_then_unavailable() {
        let (m, calls) = mock(StatusCode::OK, json!({"valid": true}), Duration::from_secs(2));
        let outcome = client(spawn(m).await).validate("abc").await;
        assert!(matches!(outcome, ValidationOutcome::Unavailable(_)));
        assert!(!outcome.claims().valid);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let (m, calls) = mock(StatusCode::INTERNAL_SERVER_ERROR, json!({}), Duration::ZERO);
        let outcome = client(spawn(m).await).validate("abc").await;
        assert!(matches!(outcome, ValidationOutcome::Unavailable(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connection_refused_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let started = std::time::Instant::now();
        let outcome = client(format!("http://{addr}/auth/validate")).validate("abc").await;
        assert!(matches!(outcome, ValidationOutcome::Unavailable(_)));
        // Two fixed 10ms pauses between the three attempts.
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_dropped_connections_use_every_attempt() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });

        let outcome = client(format!("http://{addr}/auth/validate")).validate("abc").await;
        assert!(matches!(outcome, ValidationOutcome::Unavailable(_)));
        assert_eq!(accepted.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_saturated_client_gives_up_after_the_deadline() {
        let (m, calls) = mock(StatusCode::OK, json!({"valid": true}), Duration::ZERO);
        let config = AuthorityConfig {
            validation_url: spawn(m).await,
            timeout_ms: 50,
            max_concurrency: 1,
            ..AuthorityConfig::default()
        };
        let breaker = Arc::new(CircuitBreaker::new(AUTHORITY_BREAKER, CircuitBreakerConfig::default()));
        let client = AuthorityClient::new(&config, breaker).unwrap();

        let _held = client.permits.acquire().await.unwrap();
        let started = std::time::Instant::now();
        let outcome = client.validate("abc").await;
        assert!(matches!(outcome, ValidationOutcome::Unavailable(_)));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_open_breaker_skips_the_call() {
        let (m, calls) = mock(StatusCode::OK, json!({"valid": true}), Duration::ZERO);
        let client = client(spawn(m).await);
        client.breaker().force_open();
        let outcome = client.validate("abc").await;
        assert!(matches!(outcome, ValidationOutcome::Unavailable(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_retryability() {
        assert!(CallError::Transport("reset".into()).is_retryable());
        assert!(CallError::Timeout(DeadlineExceeded { limit_ms: 5 }).is_retryable());
        assert!(!CallError::Rejected(401).is_retryable());
        assert!(!CallError::Status(500).is_retryable());
        assert!(!CallError::Decode("x".into()).is_retryable());
    }
}
