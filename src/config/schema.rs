//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::http::fallback::BackendService;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Gateway identity.
    pub gateway: GatewayIdentity,

    /// Remote token-validation authority.
    pub authority: AuthorityConfig,

    /// Service-to-service trust settings.
    pub trust: TrustConfig,

    /// Authentication bypass settings.
    pub authentication: AuthenticationConfig,

    /// Correlation / request logging settings.
    pub correlation: CorrelationConfig,

    /// Route definitions mapping path prefixes to backend groups.
    pub routes: Vec<RouteConfig>,

    /// Backend groups with their static instance lists.
    pub backend_groups: Vec<BackendGroupConfig>,

    /// Circuit breaker settings shared by every breaker.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin endpoints.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Name the gateway reports in error bodies and downstream headers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayIdentity {
    pub name: String,
}

impl Default for GatewayIdentity {
    fn default() -> Self {
        Self {
            name: "orion-gateway".to_string(),
        }
    }
}

/// Token-validation authority.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Validation endpoint; the bearer token is POSTed here.
    pub validation_url: String,

    /// Per-attempt deadline in milliseconds.
    pub timeout_ms: u64,

    /// Extra attempts after a timeout or connection failure.
    pub max_retries: u32,

    /// Fixed pause between attempts in milliseconds.
    pub retry_delay_ms: u64,

    /// Maximum validation calls in flight at once.
    pub max_concurrency: usize,

    /// Largest response body accepted from the authority.
    pub max_response_bytes: usize,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            validation_url: "http://orion-auth:8091/auth/validate".to_string(),
            timeout_ms: 5_000,
            max_retries: 2,
            retry_delay_ms: 500,
            max_concurrency: 256,
            max_response_bytes: 1024 * 1024,
        }
    }
}

/// Service-to-service trust.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Shared secret internal callers present in `X-Service-Token`.
    pub service_token: String,

    /// Services allowed to assert internal trust.
    pub trusted_services: Vec<String>,
}

/// Placeholder secrets that must be replaced before production use.
pub const PLACEHOLDER_SECRET: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Override via GATEWAY_SERVICE_TOKEN.
            service_token: PLACEHOLDER_SECRET.to_string(),
            trusted_services: vec![
                "orion-auth".to_string(),
                "orion-user".to_string(),
                "orion-program".to_string(),
                "orion-document".to_string(),
            ],
        }
    }
}

/// Authentication bypass configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthenticationConfig {
    /// Path prefixes exempt from token validation.
    pub public_routes: Vec<String>,
}

impl Default for AuthenticationConfig {
    fn default() -> Self {
        Self {
            public_routes: [
                "/oauth2/authorization",
                "/login/oauth2/code",
                "/api/auth/login",
                "/api/auth/validate",
                "/api/auth/jwks",
                "/actuator/health",
                "/health",
                "/fallback",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Correlation stage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Requests slower than this get an extra warning.
    pub slow_request_threshold_ms: u64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            slow_request_threshold_ms: 5_000,
        }
    }
}

/// Route configuration mapping requests to backend groups.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging.
    pub name: String,

    /// Path prefix to match.
    pub path_prefix: String,

    /// Backend group name to forward to.
    pub backend_group: String,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,
}

/// A logical backend with its static instances.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendGroupConfig {
    /// Group name (also the circuit breaker name).
    pub name: String,

    /// Instance addresses as `host:port`.
    pub instances: Vec<String>,

    /// Canned response to serve while the group's circuit is open.
    #[serde(default)]
    pub fallback: Option<BackendService>,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Half-open successes that close it again.
    pub success_threshold: u32,

    /// Seconds to stay open before probing.
    pub open_secs: u64,

    /// Sliding window size for the error rate.
    pub window_size: usize,

    /// Error rate (0.0 - 1.0) over a full window that opens the circuit.
    pub error_rate_threshold: f64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_secs: 30,
            window_size: 20,
            error_rate_threshold: 0.5,
        }
    }
}

/// Timeout configuration for backend calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend request timeout (total time for request/response) in seconds.
    pub backend_request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            backend_request_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the circuit breaker admin endpoints.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: PLACEHOLDER_SECRET.to_string(),
        }
    }
}
