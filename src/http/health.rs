//! Liveness endpoint.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

/// Always healthy while the process serves requests. Not rate limited.
pub async fn health_handler() -> Json<HealthStatus> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64();

    Json(HealthStatus {
        status: "healthy",
        timestamp,
    })
}
