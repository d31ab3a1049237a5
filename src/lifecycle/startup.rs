//! Startup orchestration.
//!
//! Validates the configuration and builds the long-lived collaborators the
//! HTTP server needs. The counter store is chosen here, once.

use std::sync::Arc;

use thiserror::Error;

use crate::config::{validate_config, ConfigError, RelayConfig};
use crate::controller::{ControllerClient, ControllerError, JobLauncher, UnconfiguredLauncher};
use crate::security::rate_limit::RateLimiter;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build controller client: {0}")]
    Controller(#[from] ControllerError),
}

/// Everything the server needs, built from a loaded configuration.
pub struct Prepared {
    pub config: RelayConfig,
    pub launcher: Arc<dyn JobLauncher>,
    pub limiter: Arc<RateLimiter>,
}

/// Validate `config` and build the controller client and rate limiter.
///
/// An invalid configuration is fatal in production. In development the relay
/// starts anyway and every launch fails with the reason.
pub async fn prepare(config: RelayConfig) -> Result<Prepared, StartupError> {
    let development = config.environment.is_development();

    match validate_config(&config) {
        Ok(()) => tracing::info!("Configuration validation passed"),
        Err(errors) => {
            let err = ConfigError::Validation(errors);
            if !development {
                return Err(err.into());
            }
            tracing::warn!(error = %err, "Configuration validation failed, continuing in development mode");
        }
    }

    let launcher: Arc<dyn JobLauncher> = match ControllerClient::new(&config.controller) {
        Ok(client) => {
            tracing::info!(
                kind = client.target().label(),
                name = client.target().name(),
                timeout_secs = config.controller.timeout_secs,
                "Controller client ready"
            );
            Arc::new(client)
        }
        Err(e) if development => {
            tracing::warn!(error = %e, "Controller client unavailable, launches will fail");
            Arc::new(UnconfiguredLauncher::new(e.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let limiter = Arc::new(RateLimiter::connect(&config.rate_limit).await);
    tracing::info!(
        backend = limiter.backend(),
        per_client = %config.rate_limit.per_client,
        global = %config.rate_limit.global,
        "Rate limiter ready"
    );

    Ok(Prepared {
        config,
        launcher,
        limiter,
    })
}
