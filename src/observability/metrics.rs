//! Metrics collection and exposition.
//!
//! # Metrics
//! - `datasource_proxy_requests_total` (counter): proxied calls by status
//! - `datasource_proxy_request_duration_seconds` (histogram): call latency
//! - `datasource_proxy_rejections_total` (counter): rejections by reason
//! - `datasource_proxy_upstream_responses_total` (counter): upstream status by plugin
//! - `datasource_cache_lookups_total` (counter): hit / miss / bypass
//!
//! Recording is a no-op until a recorder is installed, so tests and
//! embedders without Prometheus pay nothing.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder with its own HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(status: u16, start: Instant) {
    metrics::counter!("datasource_proxy_requests_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("datasource_proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rejection(reason: &'static str) {
    metrics::counter!("datasource_proxy_rejections_total", "reason" => reason).increment(1);
}

pub fn record_upstream_response(plugin: &str, status: u16) {
    metrics::counter!(
        "datasource_proxy_upstream_responses_total",
        "plugin" => plugin.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_cache_lookup(result: &'static str) {
    metrics::counter!("datasource_cache_lookups_total", "result" => result).increment(1);
}
