//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `trust.service_token`.
pub const ENV_SERVICE_TOKEN: &str = "GATEWAY_SERVICE_TOKEN";
/// Environment variable overriding `authority.validation_url`.
pub const ENV_VALIDATION_URL: &str = "AUTH_SERVICE_VALIDATION_URL";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, override from the process environment, and validate a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: GatewayConfig = toml::from_str(&content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Defaults plus environment overrides, validated. Used when no file is given.
pub fn default_config() -> Result<GatewayConfig, ConfigError> {
    let mut config = GatewayConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply secret/endpoint overrides looked up through `lookup`.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = lookup(ENV_SERVICE_TOKEN).filter(|v| !v.is_empty()) {
        config.trust.service_token = token;
    }
    if let Some(url) = lookup(ENV_VALIDATION_URL).filter(|v| !v.is_empty()) {
        config.authority.validation_url = url;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [gateway]
            name = "edge"

            [authority]
            validation_url = "http://127.0.0.1:8091/auth/validate"
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.gateway.name, "edge");
        assert_eq!(config.authority.validation_url, "http://127.0.0.1:8091/auth/validate");
    }

    #[test]
    fn test_invalid_file_reports_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[authority]\ntimeout_ms = 0").unwrap();
        assert!(matches!(load_config(file.path()), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, |key| match key {
            ENV_SERVICE_TOKEN => Some("from-env".to_string()),
            ENV_VALIDATION_URL => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.trust.service_token, "from-env");
        assert_eq!(config.authority.validation_url, "http://orion-auth:8091/auth/validate");
    }

    #[test]
    fn test_demo_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/gateway.toml");
        let config = load_config(&path).unwrap();
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.backend_groups.len(), 2);
        assert!(config.admin.enabled);
    }
}
