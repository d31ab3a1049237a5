//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming /provision request:
//!     → rate_limit.rs (per-client + global quota, backed by store.rs)
//!     → hostname.rs (normalize and validate the target hostname)
//!     → Pass to controller client
//! ```
//!
//! # Design Decisions
//! - Defense in depth: grammar check plus explicit pattern rejection
//! - Fail closed: a counter store error rejects the request
//! - No trust in client input

pub mod hostname;
pub mod rate_limit;
pub mod store;

pub use hostname::{Hostname, HostnameSanitizer};
pub use rate_limit::{RateLimitSpec, RateLimiter};
