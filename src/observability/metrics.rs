//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define hosting metrics (resolutions, cache size, builds)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `hosting_resolutions_total` (counter): host lookups by outcome
//!   (`cache_hit`, `resolved`, `not_found`, `error`)
//! - `hosting_cached_hosts` (gauge): entries in the current resolution cache
//! - `hosting_builds_total` (counter): build passes by result
//! - `hosting_build_issues` (gauge): issues found by the last build
//! - `hosting_build_duration_seconds` (histogram): build pass duration
//! - `admin_requests_total` (counter): admin API requests by endpoint, status
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op, so the library
//!   records unconditionally
//! - Labels are low cardinality: never a raw host name

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_resolution(outcome: &'static str) {
    counter!("hosting_resolutions_total", "outcome" => outcome).increment(1);
}

pub fn record_cached_hosts(count: usize) {
    gauge!("hosting_cached_hosts").set(count as f64);
}

pub fn record_build(accepted: bool, issues: usize, started: Instant) {
    let result = if accepted { "accepted" } else { "rejected" };
    counter!("hosting_builds_total", "result" => result).increment(1);
    gauge!("hosting_build_issues").set(issues as f64);
    histogram!("hosting_build_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_admin_request(endpoint: String, status: u16) {
    counter!(
        "admin_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
}
