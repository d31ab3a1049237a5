//! Request identification and body extraction.
//!
//! # Responsibilities
//! - Generate a UUID v4 request ID when the client did not send one
//! - Pull the `hostname` field out of a JSON or form body
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Body shape is decided by the Content-Type header, form is the default

use axum::http::{header::CONTENT_TYPE, HeaderMap, HeaderName, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::http::response::ApiError;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        id.parse().ok().map(RequestId::new)
    }
}

/// Read the request ID set by the request-id layer.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|essence| {
            let essence = essence.trim().to_ascii_lowercase();
            essence == "application/json" || essence.ends_with("+json")
        })
        .unwrap_or(false)
}

/// Extract the raw `hostname` value.
///
/// Absent, null and empty values all count as missing. A JSON value that is
/// not a string is an invalid hostname.
pub fn extract_hostname(headers: &HeaderMap, body: &[u8]) -> Result<String, ApiError> {
    let raw = if is_json(headers) {
        match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(serde_json::Value::Object(mut fields)) => match fields.remove("hostname") {
                None | Some(serde_json::Value::Null) => None,
                Some(serde_json::Value::String(s)) => Some(s),
                Some(_) => return Err(ApiError::InvalidHostname),
            },
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "Request body is not valid JSON");
                None
            }
        }
    } else {
        url::form_urlencoded::parse(body)
            .find(|(key, _)| key == "hostname")
            .map(|(_, value)| value.into_owned())
    };

    raw.filter(|s| !s.is_empty()).ok_or(ApiError::MissingHostname)
}
