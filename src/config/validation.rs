//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the controller URL, credentials and launch target
//! - Validate value ranges (timeouts > 0, hostname bounds ordered)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Whether a failure is fatal is decided by the caller (see `lifecycle::startup`)

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::RelayConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("controller base URL is required")]
    MissingControllerUrl,

    #[error("controller base URL '{url}' is invalid: {reason}")]
    InvalidControllerUrl { url: String, reason: String },

    #[error("either a username/password pair or a token is required")]
    MissingCredentials,

    #[error("either a template name or a workflow name is required")]
    MissingLaunchTarget,

    #[error("cannot specify both a template name and a workflow name")]
    ConflictingLaunchTarget,

    #[error("hostname length bounds {min}..={max} are invalid")]
    InvalidHostnameBounds { min: usize, max: usize },

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error(
        "request timeout of {request_secs}s must exceed two controller calls of {controller_secs}s each"
    )]
    RequestTimeoutTooShort {
        request_secs: u64,
        controller_secs: u64,
    },

    #[error("bind address '{0}' is not a valid socket address")]
    InvalidBindAddress(String),
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let controller = &config.controller;

    match controller.base_url.as_deref() {
        None => errors.push(ValidationError::MissingControllerUrl),
        Some(raw) => match url::Url::parse(raw) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => errors.push(ValidationError::InvalidControllerUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            }),
            Err(e) => errors.push(ValidationError::InvalidControllerUrl {
                url: raw.to_string(),
                reason: e.to_string(),
            }),
        },
    }

    if controller.auth().is_none() {
        errors.push(ValidationError::MissingCredentials);
    }

    match (&controller.template_name, &controller.workflow_name) {
        (None, None) => errors.push(ValidationError::MissingLaunchTarget),
        (Some(_), Some(_)) => errors.push(ValidationError::ConflictingLaunchTarget),
        _ => {}
    }

    if controller.timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue("controller.timeout_secs"));
    }

    let bounds = config.hostname;
    if bounds.min_length == 0 || bounds.min_length > bounds.max_length {
        errors.push(ValidationError::InvalidHostnameBounds {
            min: bounds.min_length,
            max: bounds.max_length,
        });
    }

    if config.rate_limit.per_client.limit == 0 {
        errors.push(ValidationError::ZeroValue("rate_limit.per_client"));
    }
    if config.rate_limit.global.limit == 0 {
        errors.push(ValidationError::ZeroValue("rate_limit.global"));
    }

    let request_secs = config.listener.request_timeout_secs;
    if request_secs == 0 {
        errors.push(ValidationError::ZeroValue("listener.request_timeout_secs"));
    } else if controller.timeout_secs > 0
        && request_secs <= controller.timeout_secs.saturating_mul(2)
    {
        // A launch is a lookup followed by a launch call, each with its own deadline.
        errors.push(ValidationError::RequestTimeoutTooShort {
            request_secs,
            controller_secs: controller.timeout_secs,
        });
    }
    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
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

    fn valid_config() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.controller.base_url = Some("https://awx.example.com".into());
        config.controller.token = Some("token".into());
        config.controller.template_name = Some("provision-host".into());
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_empty_config_reports_every_problem() {
        let errors = validate_config(&RelayConfig::default()).unwrap_err();
        assert!(errors.contains(&ValidationError::MissingControllerUrl));
        assert!(errors.contains(&ValidationError::MissingCredentials));
        assert!(errors.contains(&ValidationError::MissingLaunchTarget));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_both_targets_rejected() {
        let mut config = valid_config();
        config.controller.workflow_name = Some("wf".into());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::ConflictingLaunchTarget]);
    }

    #[test]
    fn test_bad_url_rejected() {
        let mut config = valid_config();
        config.controller.base_url = Some("not a url".into());
        assert!(matches!(
            validate_config(&config).unwrap_err()[0],
            ValidationError::InvalidControllerUrl { .. }
        ));

        config.controller.base_url = Some("ftp://awx.example.com".into());
        assert!(matches!(
            validate_config(&config).unwrap_err()[0],
            ValidationError::InvalidControllerUrl { .. }
        ));
    }

    #[test]
    fn test_basic_credentials_accepted() {
        let mut config = valid_config();
        config.controller.token = None;
        config.controller.username = Some("admin".into());
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::MissingCredentials]
        );

        config.controller.password = Some("secret".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_inverted_hostname_bounds() {
        let mut config = valid_config();
        config.hostname.min_length = 10;
        config.hostname.max_length = 5;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::InvalidHostnameBounds { min: 10, max: 5 }]
        );
    }

    #[test]
    fn test_request_timeout_covers_both_controller_calls() {
        let mut config = valid_config();
        config.controller.timeout_secs = 20;
        config.listener.request_timeout_secs = 30;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::RequestTimeoutTooShort {
                request_secs: 30,
                controller_secs: 20,
            }]
        );

        config.listener.request_timeout_secs = 40;
        assert!(validate_config(&config).is_err());

        config.listener.request_timeout_secs = 41;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_error_display() {
        let err = ValidationError::ZeroValue("controller.timeout_secs");
        assert_eq!(err.to_string(), "controller.timeout_secs must be greater than zero");
    }
}
