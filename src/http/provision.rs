//! The provisioning endpoint.
//!
//! # Flow
//! ```text
//! POST /provision
//!     → rate_limit_middleware (already admitted by the time we run)
//!     → extract hostname (JSON or form)
//!     → HostnameSanitizer
//!     → JobLauncher::launch_job
//!     → 200 / 500 JSON
//! ```

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};

use crate::http::request::{extract_hostname, request_id};
use crate::http::response::{launch_response, ApiError};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::rate_limit::ClientAddr;

pub async fn provision_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    match provision(state, request).await {
        Ok(response) => response,
        Err(e) => {
            metrics::record_provision(e.status().as_u16());
            e.into_response()
        }
    }
}

async fn provision(state: AppState, request: Request<Body>) -> Result<Response, ApiError> {
    let headers = request.headers().clone();
    let request_id = request_id(&headers).to_string();
    let client = request
        .extensions()
        .get::<ClientAddr>()
        .map(|ClientAddr(addr)| addr.clone())
        .unwrap_or_else(|| "unknown".to_string());

    // The body limit layer caps what can arrive here.
    let body = Bytes::from_request(request, &()).await.map_err(|rejection| {
        tracing::warn!(request_id = %request_id, error = %rejection, "Failed to read request body");
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::UnreadableBody
        }
    })?;

    let raw = extract_hostname(&headers, &body).inspect_err(|e| {
        tracing::warn!(request_id = %request_id, client = %client, reason = %e, "Rejected provisioning request");
    })?;

    let hostname = state.sanitizer.sanitize(&raw).ok_or_else(|| {
        tracing::warn!(request_id = %request_id, client = %client, hostname = ?raw, "Invalid hostname rejected");
        ApiError::InvalidHostname
    })?;

    tracing::info!(
        request_id = %request_id,
        client = %client,
        hostname = %hostname,
        "Provisioning request"
    );

    let result = state.launcher.launch_job(&hostname).await;
    let response = launch_response(hostname, result);
    metrics::record_provision(response.status().as_u16());
    Ok(response)
}
