//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by call kind and status
//! - `proxy_cache_total` (counter): cache lookups by result (hit/miss/error)
//! - `proxy_upstream_errors_total` (counter): failed upstream round trips

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "failed to install metrics exporter"),
    }
}

/// Count a completed proxy request.
pub fn record_request(kind: &str, status: u16) {
    metrics::counter!(
        "proxy_requests_total",
        "kind" => kind.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
}

/// Count a cache lookup outcome.
pub fn record_cache(result: &str) {
    metrics::counter!("proxy_cache_total", "result" => result.to_string()).increment(1);
}

/// Count a failed upstream round trip.
pub fn record_upstream_error(kind: &str) {
    metrics::counter!("proxy_upstream_errors_total", "kind" => kind.to_string()).increment(1);
}
