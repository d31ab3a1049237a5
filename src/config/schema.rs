//! Configuration schema definitions.
//!
//! Every section derives Serde traits so the whole tree can be read from a
//! TOML file; the environment overlay in `loader.rs` then writes on top.

use serde::{Deserialize, Serialize};

use crate::security::rate_limit::RateLimitSpec;

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Production or development mode.
    pub environment: Environment,

    /// Listener configuration (bind address, request limits).
    pub listener: ListenerConfig,

    /// Automation controller connection settings.
    pub controller: ControllerConfig,

    /// Per-client and global quotas.
    pub rate_limit: RateLimitConfig,

    /// Accepted hostname length bounds.
    pub hostname: HostnameConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Deployment mode. Development tolerates an invalid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" => Ok(Environment::Development),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,

    /// Total time allowed for one request, including both controller calls.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 16 * 1024,
        }
    }
}

/// Automation controller settings.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Base URL of the controller, without the `/api/v2` suffix.
    pub base_url: Option<String>,

    pub username: Option<String>,
    pub password: Option<String>,

    /// Bearer token. Takes precedence over username/password.
    pub token: Option<String>,

    /// Job template to launch. Mutually exclusive with `workflow_name`.
    pub template_name: Option<String>,

    /// Workflow job template to launch. Mutually exclusive with `template_name`.
    pub workflow_name: Option<String>,

    /// Timeout applied to each outbound call, in seconds.
    pub timeout_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            username: None,
            password: None,
            token: None,
            template_name: None,
            workflow_name: None,
            timeout_secs: 10,
        }
    }
}

// Credentials stay out of logs.
impl std::fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("template_name", &self.template_name)
            .field("workflow_name", &self.workflow_name)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ControllerConfig {
    /// Resolve credentials. A token wins over a username/password pair.
    pub fn auth(&self) -> Option<ControllerAuth> {
        if let Some(token) = &self.token {
            return Some(ControllerAuth::Bearer(token.clone()));
        }
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(ControllerAuth::Basic {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    /// The configured launch target, if exactly one of template/workflow is set.
    pub fn target(&self) -> Option<LaunchTarget> {
        match (&self.template_name, &self.workflow_name) {
            (Some(name), None) => Some(LaunchTarget::Template(name.clone())),
            (None, Some(name)) => Some(LaunchTarget::Workflow(name.clone())),
            _ => None,
        }
    }
}

/// Credentials attached to every outbound controller call.
#[derive(Clone, PartialEq, Eq)]
pub enum ControllerAuth {
    Bearer(String),
    Basic { username: String, password: String },
}

impl std::fmt::Debug for ControllerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerAuth::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            ControllerAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// What the controller launches for each hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
    Template(String),
    Workflow(String),
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Quota applied per client IP.
    pub per_client: RateLimitSpec,

    /// Quota shared by every client.
    pub global: RateLimitSpec,

    /// Redis URL for shared counters. Unset means in-process counters.
    pub store_url: Option<String>,

    /// How long to wait for the store to answer at startup.
    pub store_connect_timeout_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_client: RateLimitSpec::per_minutes(1, 5),
            global: RateLimitSpec::per_minutes(100, 60),
            store_url: None,
            store_connect_timeout_secs: 2,
        }
    }
}

/// Accepted hostname length bounds, in characters.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct HostnameConfig {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for HostnameConfig {
    fn default() -> Self {
        Self {
            min_length: 1,
            max_length: 253,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}' (expected text|json)", other)),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log output format.
    pub log_format: LogFormat,

    /// Filter used when `RUST_LOG` is not set.
    pub log_filter: String,

    /// Prometheus exporter listen address. Unset disables the exporter.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Text,
            log_filter: "provision_relay=info,tower_http=info".to_string(),
            metrics_address: None,
        }
    }
}
