//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing backend groups)
//! - Validate value ranges (timeouts > 0, thresholds in range)
//! - Refuse placeholder secrets where they would be live
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use axum::http::uri::Authority;
use url::Url;

use crate::config::schema::{GatewayConfig, PLACEHOLDER_SECRET};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Check every semantic rule and collect all failures.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.gateway.name.trim().is_empty() {
        errors.push(ValidationError::new("gateway.name", "must not be empty"));
    }

    match Url::parse(&config.authority.validation_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "authority.validation_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("authority.validation_url", e.to_string())),
    }
    if config.authority.timeout_ms == 0 {
        errors.push(ValidationError::new("authority.timeout_ms", "must be > 0"));
    }
    if config.authority.max_concurrency == 0 {
        errors.push(ValidationError::new("authority.max_concurrency", "must be > 0"));
    }

    if config.trust.service_token.is_empty() {
        errors.push(ValidationError::new("trust.service_token", "must not be empty"));
    }
    if config.trust.trusted_services.is_empty() {
        errors.push(ValidationError::new("trust.trusted_services", "must list at least one service"));
    }

    for (i, prefix) in config.authentication.public_routes.iter().enumerate() {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::new(
                format!("authentication.public_routes[{i}]"),
                format!("'{prefix}' must start with '/'"),
            ));
        }
    }

    let mut groups = HashSet::new();
    for (i, group) in config.backend_groups.iter().enumerate() {
        if !groups.insert(group.name.as_str()) {
            errors.push(ValidationError::new(
                format!("backend_groups[{i}].name"),
                format!("duplicate group '{}'", group.name),
            ));
        }
        if group.instances.is_empty() {
            errors.push(ValidationError::new(
                format!("backend_groups[{i}].instances"),
                "must list at least one instance",
            ));
        }
        for instance in &group.instances {
            if instance.parse::<Authority>().is_err() {
                errors.push(ValidationError::new(
                    format!("backend_groups[{i}].instances"),
                    format!("'{instance}' is not host:port"),
                ));
            }
        }
    }

    for (i, route) in config.routes.iter().enumerate() {
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::new(
                format!("routes[{i}].path_prefix"),
                format!("'{}' must start with '/'", route.path_prefix),
            ));
        }
        if !groups.contains(route.backend_group.as_str()) {
            errors.push(ValidationError::new(
                format!("routes[{i}].backend_group"),
                format!("unknown backend group '{}'", route.backend_group),
            ));
        }
    }

    let breaker = &config.circuit_breaker;
    if breaker.failure_threshold == 0 || breaker.success_threshold == 0 || breaker.window_size == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker",
            "thresholds and window_size must be > 0",
        ));
    }
    if !(0.0..=1.0).contains(&breaker.error_rate_threshold) {
        errors.push(ValidationError::new(
            "circuit_breaker.error_rate_threshold",
            "must be between 0.0 and 1.0",
        ));
    }

    if config.timeouts.backend_request_secs == 0 {
        errors.push(ValidationError::new("timeouts.backend_request_secs", "must be > 0"));
    }

    if config.admin.enabled && (config.admin.api_key.is_empty() || config.admin.api_key == PLACEHOLDER_SECRET) {
        errors.push(ValidationError::new("admin.api_key", "must be set when admin is enabled"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{BackendGroupConfig, RouteConfig};

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GatewayConfig::default();
        config.authority.validation_url = "not a url".into();
        config.trust.service_token.clear();
        config.authentication.public_routes.push("health".into());
        config.routes.push(RouteConfig {
            name: "users".into(),
            path_prefix: "/api/users".into(),
            backend_group: "missing".into(),
            priority: 0,
        });

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"authority.validation_url"));
        assert!(fields.contains(&"trust.service_token"));
        assert!(fields.iter().any(|f| f.starts_with("authentication.public_routes")));
        assert!(fields.contains(&"routes[0].backend_group"));
    }

    #[test]
    fn test_rejects_bad_instance_and_placeholder_admin_key() {
        let mut config = GatewayConfig::default();
        config.backend_groups.push(BackendGroupConfig {
            name: "orion-user".into(),
            instances: vec!["http://localhost:8092/x".into()],
            fallback: None,
        });
        config.admin.enabled = true;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "backend_groups[0].instances"));
        assert!(errors.iter().any(|e| e.field == "admin.api_key"));
    }
}
