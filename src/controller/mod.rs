//! Automation controller integration.
//!
//! # Data Flow
//! ```text
//! sanitized Hostname
//!     → client.rs: GET {collection}?name=<target>   (resolve id)
//!     → client.rs: POST {collection}{id}/launch/    (limit = hostname)
//!     → types.rs: JobLaunchResult (Success | Failure)
//! ```
//!
//! # Design Decisions
//! - The two calls are sequential and each has its own deadline
//! - No retries: a failed attempt is reported to the caller immediately
//! - Handlers depend on the `JobLauncher` trait, not the concrete client

pub mod client;
pub mod types;

pub use client::{ControllerClient, JobLauncher, UnconfiguredLauncher};
pub use types::{ControllerError, ControllerResult, JobLaunchResult, JobType};
