//! Metrics collection and exposition.
//!
//! # Metrics
//! - `end_session_requests_cached_total` (counter)
//! - `end_session_requests_restored_total` (counter)
//! - `end_session_requests_rejected_total` (counter): by reason
//! - `end_session_responses_total` (counter): by directive
//! - `end_session_cache_cleanup_failures_total` (counter)

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter started"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request_cached() {
    counter!("end_session_requests_cached_total").increment(1);
}

pub fn record_request_restored() {
    counter!("end_session_requests_restored_total").increment(1);
}

pub fn record_request_rejected(reason: &'static str) {
    counter!("end_session_requests_rejected_total", "reason" => reason).increment(1);
}

pub fn record_response(directive: &'static str) {
    counter!("end_session_responses_total", "directive" => directive).increment(1);
}

pub fn record_cleanup_failure() {
    counter!("end_session_cache_cleanup_failures_total").increment(1);
}
