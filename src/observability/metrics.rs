//! Metrics collection and exposition.
//!
//! # Metrics
//! - `listeners_current` (gauge): listeners counted as connected
//! - `listeners_pending_removal` (gauge): early leaves waiting for their join
//! - `webhook_requests_total` (counter): webhook calls by route, outcome
//! - `compat_rewrites_total` (counter): rewritten `ICE/1.0` request lines
//! - `connections_active` (gauge): open client connections
//! - `listen_log_entries_total` (counter): listen log appends by outcome
//!
//! Until `init_metrics` installs the Prometheus recorder every update is a
//! no-op, so tests and embedders pay nothing.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_listener_counts(listeners: usize, pending: usize) {
    metrics::gauge!("listeners_current").set(listeners as f64);
    metrics::gauge!("listeners_pending_removal").set(pending as f64);
}

pub fn record_webhook(route: &'static str, outcome: &'static str) {
    metrics::counter!("webhook_requests_total", "route" => route, "outcome" => outcome)
        .increment(1);
}

pub fn record_compat_rewrite() {
    metrics::counter!("compat_rewrites_total").increment(1);
}

pub fn record_active_connections(count: u64) {
    metrics::gauge!("connections_active").set(count as f64);
}

pub fn record_listen_log(outcome: &'static str) {
    metrics::counter!("listen_log_entries_total", "outcome" => outcome).increment(1);
}
