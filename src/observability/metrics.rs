//! Metrics collection and exposition.
//!
//! # Metrics
//! - `log_sink_records_total` (counter): sink outcomes by `outcome`
//!   (accepted, dropped_full, dropped_closed, written)
//! - `log_sink_write_failures_total` (counter): writer errors and panics
//! - `log_sink_flush_failures_total` (counter): failed flushes of buffered output
//! - `http_requests_total` (counter): requests by method, status
//! - `http_request_duration_seconds` (histogram): latency distribution
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Nothing here logs, so the sink can call in without recursing

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()
}

pub fn record_sink_outcome(outcome: &'static str) {
    counter!("log_sink_records_total", "outcome" => outcome).increment(1);
}

pub fn record_sink_write_failure() {
    counter!("log_sink_write_failures_total").increment(1);
}

pub fn record_sink_flush_failure() {
    counter!("log_sink_flush_failures_total").increment(1);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("http_request_duration_seconds").record(start.elapsed().as_secs_f64());
}
