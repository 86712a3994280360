//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_connections_total{protocol}` (counter): classified connections
//! - `proxy_classification_failures_total{reason}` (counter): closed, timeout, io
//! - `proxy_pipe_sessions_total{outcome}` (counter): finished store sessions
//! - `proxy_pipe_bytes_total{direction}` (counter): relayed bytes
//! - `proxy_health_checks_total{result}` (counter): liveness probes
//! - `proxy_active_connections` (gauge): current connection count

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

use crate::net::pipe::PipeStats;
use crate::protocol::Protocol;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn set_active_connections(count: u64) {
    ::metrics::gauge!("proxy_active_connections").set(count as f64);
}

pub fn record_classified(protocol: Protocol) {
    ::metrics::counter!("proxy_connections_total", "protocol" => protocol.as_str()).increment(1);
}

pub fn record_classification_failure(reason: &'static str) {
    ::metrics::counter!("proxy_classification_failures_total", "reason" => reason).increment(1);
}

/// Record a finished pipe session. `stats` is absent when the session failed
/// before any byte count was known.
pub fn record_pipe_session(outcome: &'static str, stats: Option<PipeStats>) {
    ::metrics::counter!("proxy_pipe_sessions_total", "outcome" => outcome).increment(1);
    if let Some(stats) = stats {
        ::metrics::counter!("proxy_pipe_bytes_total", "direction" => "client_to_backend")
            .increment(stats.client_to_backend);
        ::metrics::counter!("proxy_pipe_bytes_total", "direction" => "backend_to_client")
            .increment(stats.backend_to_client);
    }
}

pub fn record_health_check(healthy: bool) {
    let result = if healthy { "healthy" } else { "unhealthy" };
    ::metrics::counter!("proxy_health_checks_total", "result" => result).increment(1);
}
