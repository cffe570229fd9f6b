//! Metrics collection and exposition.
//!
//! # Metrics
//! - `soap_bridge_requests_total` (counter): SOAP requests by outcome, status
//! - `soap_bridge_request_duration_seconds` (histogram): latency by outcome
//!
//! `outcome` is `forwarded` or the failure classification (`invalid envelope`,
//! `tls`, `timeout`, `connection refused`, ...).

use axum::http::StatusCode;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

pub const REQUESTS_TOTAL: &str = "soap_bridge_requests_total";
pub const REQUEST_DURATION: &str = "soap_bridge_request_duration_seconds";

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

/// Record one finished SOAP request.
pub fn record_request(outcome: &'static str, status: StatusCode, started: Instant) {
    ::metrics::counter!(
        REQUESTS_TOTAL,
        "outcome" => outcome,
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    ::metrics::histogram!(REQUEST_DURATION, "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}
