//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mxgw_requests_total` (counter): requests by protocol and outcome
//! - `mxgw_request_duration_seconds` (histogram): end-to-end latency by protocol
//! - `mxgw_decode_total` (counter): decoded requests by crypto and compression adapter
//! - `mxgw_sessions_total` (counter): session lookups by outcome
//! - `mxgw_active_sessions` (gauge): sessions currently cached
//!
//! Until `init_metrics` installs the Prometheus recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::codec::DecodeTrace;

pub const REQUESTS_TOTAL: &str = "mxgw_requests_total";
pub const REQUEST_DURATION: &str = "mxgw_request_duration_seconds";
pub const DECODE_TOTAL: &str = "mxgw_decode_total";
pub const SESSIONS_TOTAL: &str = "mxgw_sessions_total";
pub const ACTIVE_SESSIONS: &str = "mxgw_active_sessions";

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter"),
    }
}

/// Record one finished gateway request.
pub fn record_request(protocol: &str, outcome: &'static str, start: Instant) {
    let protocol = protocol.to_string();
    counter!(REQUESTS_TOTAL, "protocol" => protocol.clone(), "outcome" => outcome).increment(1);
    histogram!(REQUEST_DURATION, "protocol" => protocol).record(start.elapsed().as_secs_f64());
}

/// Record which adapters a decode went through.
pub fn record_decode(trace: &DecodeTrace) {
    counter!(
        DECODE_TOTAL,
        "crypto" => trace.crypto.unwrap_or("none"),
        "compression" => trace.compression.unwrap_or("none")
    )
    .increment(1);
}

pub fn record_session(outcome: &'static str, active: usize) {
    counter!(SESSIONS_TOTAL, "outcome" => outcome).increment(1);
    record_active_sessions(active);
}

pub fn record_active_sessions(active: usize) {
    gauge!(ACTIVE_SESSIONS).set(active as f64);
}
