//! Metrics collection and exposition.
//!
//! # Metrics
//! - `edge_requests_total` (counter): requests by directive and status
//! - `edge_request_duration_seconds` (histogram): latency by directive
//! - `edge_rate_limited_total` (counter): 429s by tier
//! - `edge_rate_limit_store_errors_total` (counter): fail-open admissions by tier
//! - `edge_session_refresh_total` (counter): session outcomes
//!
//! Recording is a no-op until a recorder is installed, so tests and the CLI
//! never need an exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(directive: &'static str, status: u16, start: Instant) {
    counter!("edge_requests_total", "directive" => directive, "status" => status.to_string())
        .increment(1);
    histogram!("edge_request_duration_seconds", "directive" => directive)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(tier: &'static str) {
    counter!("edge_rate_limited_total", "tier" => tier).increment(1);
}

pub fn record_store_error(tier: &'static str) {
    counter!("edge_rate_limit_store_errors_total", "tier" => tier).increment(1);
}

pub fn record_session_refresh(outcome: &'static str) {
    counter!("edge_session_refresh_total", "outcome" => outcome).increment(1);
}
