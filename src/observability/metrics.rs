//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_provision_requests_total` (counter): provisioning responses by status
//! - `relay_rate_limited_total` (counter): rejections by exhausted quota
//! - `relay_controller_requests_total` (counter): outbound calls by step, outcome
//! - `relay_controller_request_duration_seconds` (histogram): outbound latency
//!
//! Recording is a no-op until `init_metrics` installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_provision(status: u16) {
    metrics::counter!("relay_provision_requests_total", "status" => status.to_string()).increment(1);
}

pub fn record_rate_limited(scope: &'static str) {
    metrics::counter!("relay_rate_limited_total", "scope" => scope).increment(1);
}

pub fn record_controller_call(step: &'static str, outcome: &'static str, start: Instant) {
    metrics::counter!(
        "relay_controller_requests_total",
        "step" => step,
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("relay_controller_request_duration_seconds", "step" => step)
        .record(start.elapsed().as_secs_f64());
}
