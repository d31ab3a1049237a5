//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::RelayConfig;
use crate::config::validation::ValidationError;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {reason}")]
    Env { var: &'static str, reason: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: defaults, then the optional TOML file, then the
/// process environment. The result is not validated yet.
pub fn load_config(path: Option<&Path>) -> Result<RelayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => RelayConfig::default(),
    };

    apply_env(&mut config, |var| std::env::var(var).ok())?;
    Ok(config)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` returns the raw value of a variable; empty values count as unset.
pub fn apply_env<F>(config: &mut RelayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| {
        lookup(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(v) = get("RELAY_ENV") {
        config.environment = parse_var("RELAY_ENV", &v)?;
    }

    if let Some(v) = get("AWX_API_ENDPOINT") {
        config.controller.base_url = Some(v);
    }
    if let Some(v) = get("AWX_USERNAME") {
        config.controller.username = Some(v);
    }
    if let Some(v) = get("AWX_PASSWORD") {
        config.controller.password = Some(v);
    }
    if let Some(v) = get("AWX_TOKEN") {
        config.controller.token = Some(v);
    }
    if let Some(v) = get("AWX_TEMPLATE_NAME") {
        config.controller.template_name = Some(v);
    }
    if let Some(v) = get("AWX_WORKFLOW_NAME") {
        config.controller.workflow_name = Some(v);
    }
    if let Some(v) = get("AWX_TIMEOUT_SECS") {
        config.controller.timeout_secs = parse_var("AWX_TIMEOUT_SECS", &v)?;
    }

    if let Some(v) = get("PER_IP_RATE_LIMIT") {
        config.rate_limit.per_client = parse_var("PER_IP_RATE_LIMIT", &v)?;
    }
    if let Some(v) = get("GLOBAL_RATE_LIMIT") {
        config.rate_limit.global = parse_var("GLOBAL_RATE_LIMIT", &v)?;
    }
    if let Some(v) = get("REDIS_URL") {
        config.rate_limit.store_url = Some(v);
    }

    if let Some(v) = get("MIN_HOSTNAME_LENGTH") {
        config.hostname.min_length = parse_var("MIN_HOSTNAME_LENGTH", &v)?;
    }
    if let Some(v) = get("MAX_HOSTNAME_LENGTH") {
        config.hostname.max_length = parse_var("MAX_HOSTNAME_LENGTH", &v)?;
    }

    if let Some(v) = get("PORT") {
        let port: u16 = parse_var("PORT", &v)?;
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }
    if let Some(v) = get("REQUEST_TIMEOUT_SECS") {
        config.listener.request_timeout_secs = parse_var("REQUEST_TIMEOUT_SECS", &v)?;
    }

    if let Some(v) = get("LOG_FORMAT") {
        config.observability.log_format = parse_var("LOG_FORMAT", &v)?;
    }
    if let Some(v) = get("METRICS_ADDRESS") {
        config.observability.metrics_address = Some(v);
    }

    Ok(())
}

fn parse_var<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Env {
        var,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{Environment, LogFormat};
    use std::collections::HashMap;
    use std::time::Duration;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_env_overlay() {
        let vars = env(&[
            ("AWX_API_ENDPOINT", "https://awx.example.com"),
            ("AWX_USERNAME", "admin"),
            ("AWX_PASSWORD", "secret"),
            ("AWX_WORKFLOW_NAME", "bootstrap"),
            ("PER_IP_RATE_LIMIT", "2 per minute"),
            ("GLOBAL_RATE_LIMIT", "50 per hour"),
            ("MAX_HOSTNAME_LENGTH", "64"),
            ("PORT", "8080"),
            ("RELAY_ENV", "development"),
            ("LOG_FORMAT", "json"),
        ]);

        let mut config = RelayConfig::default();
        apply_env(&mut config, |k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.controller.base_url.as_deref(), Some("https://awx.example.com"));
        assert_eq!(config.controller.workflow_name.as_deref(), Some("bootstrap"));
        assert!(config.controller.template_name.is_none());
        assert_eq!(config.rate_limit.per_client.limit, 2);
        assert_eq!(config.rate_limit.per_client.window, Duration::from_secs(60));
        assert_eq!(config.rate_limit.global.limit, 50);
        assert_eq!(config.hostname.max_length, 64);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn test_empty_values_are_unset() {
        let vars = env(&[("AWX_TOKEN", "   "), ("REDIS_URL", "")]);
        let mut config = RelayConfig::default();
        apply_env(&mut config, |k| vars.get(k).cloned()).unwrap();

        assert!(config.controller.token.is_none());
        assert!(config.rate_limit.store_url.is_none());
    }

    #[test]
    fn test_bad_number_is_reported() {
        let vars = env(&[("MAX_HOSTNAME_LENGTH", "lots")]);
        let mut config = RelayConfig::default();
        let err = apply_env(&mut config, |k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "MAX_HOSTNAME_LENGTH", .. }));
    }

    #[test]
    fn test_bad_rate_limit_is_reported() {
        let vars = env(&[("PER_IP_RATE_LIMIT", "often")]);
        let mut config = RelayConfig::default();
        let err = apply_env(&mut config, |k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("PER_IP_RATE_LIMIT"));
    }

    #[test]
    fn test_validation_error_display() {
        let err = ConfigError::Validation(vec![
            ValidationError::MissingControllerUrl,
            ValidationError::MissingCredentials,
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: controller base URL is required, either a username/password pair or a token is required"
        );
    }

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("provision-relay-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_from_file() {
        let dir = scratch_dir("load");
        let path = dir.join("relay.toml");
        fs::write(
            &path,
            r#"
            [listener]
            max_body_bytes = 4096

            [observability]
            log_filter = "provision_relay=debug"
            "#,
        )
        .unwrap();

        // These keys have no environment override, so the file wins.
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.listener.max_body_bytes, 4096);
        assert_eq!(config.observability.log_filter, "provision_relay=debug");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let path = std::env::temp_dir().join("provision-relay-does-not-exist.toml");
        let result = load_config(Some(&path));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = scratch_dir("malformed");
        let path = dir.join("relay.toml");
        fs::write(&path, "[listener\nrequest_timeout_secs = ").unwrap();

        let result = load_config(Some(&path));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_request_timeout_from_env() {
        let mut config = RelayConfig::default();
        apply_env(&mut config, |k| (k == "REQUEST_TIMEOUT_SECS").then(|| "90".to_string())).unwrap();
        assert_eq!(config.listener.request_timeout_secs, 90);
    }
}
