//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional TOML file + environment variables
//!     → loader.rs (parse, overlay env)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (immutable)
//!     → handed by value to each subsystem at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ControllerAuth, ControllerConfig, Environment, HostnameConfig, LaunchTarget, ListenerConfig,
    LogFormat, ObservabilityConfig, RateLimitConfig, RelayConfig,
};
pub use validation::{validate_config, ValidationError};
