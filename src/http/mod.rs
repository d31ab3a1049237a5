//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers, request ID)
//!     → /health → health.rs
//!     → /provision → security::rate_limit (middleware)
//!                  → provision.rs (extract, sanitize, launch)
//!                  → response.rs (JSON bodies, status mapping)
//! ```

pub mod health;
pub mod provision;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{build_router, AppState, HttpServer};
