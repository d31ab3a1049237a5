//! Response bodies and error mapping.
//!
//! # Responsibilities
//! - Define the JSON bodies returned by the relay
//! - Map request-level failures to status codes
//! - Keep internal error detail out of responses
//!
//! # Design Decisions
//! - Every error body is JSON with an `error` field
//! - 429 carries both a `retry_after` field and a `Retry-After` header

use std::time::Duration;

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::controller::types::{JobLaunchResult, JobType};
use crate::security::hostname::Hostname;

/// Failures surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("hostname parameter is required")]
    MissingHostname,

    #[error("Invalid hostname format")]
    InvalidHostname,

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Failed to read request body")]
    UnreadableBody,

    #[error("Request timed out")]
    RequestTimeout,

    /// Detail is logged where the error happens, never returned.
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingHostname | ApiError::InvalidHostname | ApiError::UnreadableBody => {
                StatusCode::BAD_REQUEST
            }
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct RateLimitBody {
    error: &'static str,
    message: &'static str,
    retry_after: Option<u64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::RateLimited { retry_after } => {
                let secs = retry_after.map(ceil_secs);
                let body = RateLimitBody {
                    error: "Rate limit exceeded",
                    message: "Too many requests. Please try again later.",
                    retry_after: secs,
                };
                let mut response = (status, Json(body)).into_response();
                if let Some(secs) = secs {
                    response
                        .headers_mut()
                        .insert(RETRY_AFTER, HeaderValue::from(secs));
                }
                response
            }
            other => (
                status,
                Json(ErrorBody {
                    error: other.to_string(),
                }),
            )
                .into_response(),
        }
    }
}

/// Whole seconds, rounded up, never below one.
fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    secs.max(1)
}

/// Body of a successful provisioning response.
#[derive(Debug, Serialize)]
pub struct ProvisionAccepted {
    pub success: bool,
    pub hostname: Hostname,
    pub job_id: Option<u64>,
    pub job_type: JobType,
    pub message: String,
}

/// Body of a provisioning request the controller did not accept.
#[derive(Debug, Serialize)]
pub struct ProvisionFailed {
    pub success: bool,
    pub hostname: Hostname,
    pub error: String,
}

/// Map a launch result for `hostname` to a response.
pub fn launch_response(hostname: Hostname, result: JobLaunchResult) -> Response {
    match result {
        JobLaunchResult::Success {
            job_id, job_type, ..
        } => {
            let message = format!("Job triggered successfully for {}", hostname);
            (
                StatusCode::OK,
                Json(ProvisionAccepted {
                    success: true,
                    hostname,
                    job_id,
                    job_type,
                    message,
                }),
            )
                .into_response()
        }
        JobLaunchResult::Failure { error } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ProvisionFailed {
                success: false,
                hostname,
                error,
            }),
        )
            .into_response(),
    }
}
