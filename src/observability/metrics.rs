//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by command, verb, status
//! - `gateway_request_duration_seconds` (histogram): time to response head
//! - `gateway_bridged_bytes_total` (counter): bytes moved by direction
//! - `gateway_admission_rejections_total` (counter): heavy requests refused
//! - `gateway_inflight_executions` (gauge): engine executions in progress
//! - `gateway_choking` (gauge): 1 while the load signal is choking
//! - `gateway_lifecycle_transitions_total` (counter): worker state changes by target state
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the Prometheus recorder
//! - The exporter runs its own scrape listener, separate from the API port

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter");
        return;
    }

    describe_counter!("gateway_requests_total", "Command requests answered by the gateway.");
    describe_histogram!(
        "gateway_request_duration_seconds",
        "Time from request arrival to response head."
    );
    describe_counter!("gateway_bridged_bytes_total", "Bytes moved between HTTP and the engine.");
    describe_counter!(
        "gateway_admission_rejections_total",
        "Heavy command requests rejected under load."
    );
    describe_gauge!("gateway_inflight_executions", "Engine executions in progress.");
    describe_gauge!("gateway_choking", "1 while heavy requests are being rejected.");
    describe_counter!("gateway_lifecycle_transitions_total", "Worker lifecycle state changes.");

    tracing::info!(address = %addr, "Metrics exporter listening");
}

pub fn record_request(command: &str, verb: &str, status: u16, started: Instant) {
    let status = status.to_string();
    counter!(
        "gateway_requests_total",
        "command" => command.to_string(),
        "verb" => verb.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "command" => command.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_bridged_bytes(direction: &'static str, bytes: usize) {
    counter!("gateway_bridged_bytes_total", "direction" => direction).increment(bytes as u64);
}

pub fn record_admission_rejected(command: &str) {
    counter!("gateway_admission_rejections_total", "command" => command.to_string()).increment(1);
}

pub fn record_inflight(count: usize) {
    gauge!("gateway_inflight_executions").set(count as f64);
}

pub fn record_choking(choking: bool) {
    gauge!("gateway_choking").set(if choking { 1.0 } else { 0.0 });
}

pub fn record_lifecycle_transition(state: &'static str) {
    counter!("gateway_lifecycle_transitions_total", "state" => state).increment(1);
}
