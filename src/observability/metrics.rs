//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_requests_total` (counter): requests by method and outcome
//! - `dispatch_request_duration_seconds` (histogram): latency distribution
//! - `dispatch_sessions` (gauge): sessions held by the store
//! - `dispatch_internal_failures_total` (counter): failures caught at the
//!   request task boundary
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, outcome: &'static str, started: Instant) {
    metrics::counter!(
        "dispatch_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("dispatch_request_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_sessions(count: usize) {
    metrics::gauge!("dispatch_sessions").set(count as f64);
}

pub fn record_internal_failure() {
    metrics::counter!("dispatch_internal_failures_total").increment(1);
}
