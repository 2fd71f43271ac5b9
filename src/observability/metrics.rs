//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): calls by method and outcome
//! - `relay_upstream_duration_seconds` (histogram): transport latency by strategy
//! - `relay_failures_total` (counter): failed calls by error category
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Count one finished call.
pub fn record_relay(method: &'static str, outcome: &'static str) {
    metrics::counter!("relay_requests_total", "method" => method, "outcome" => outcome).increment(1);
}

/// Record time spent in the transport.
pub fn record_upstream_duration(transport: &'static str, start: Instant) {
    metrics::histogram!("relay_upstream_duration_seconds", "transport" => transport)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_failure(category: &'static str) {
    metrics::counter!("relay_failures_total", "category" => category).increment(1);
}
