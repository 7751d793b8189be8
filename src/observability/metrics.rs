//! Metrics collection and exposition.
//!
//! # Metrics
//! - `routing_discovery_total` (counter): discovery runs by strategy, outcome
//! - `routing_publish_total` (counter): publish/unpublish results
//! - `routing_admission_total` (counter): admission decisions
//! - `routing_jobs_running` (gauge): update jobs currently in flight
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels are static strings or repository-independent values

use std::net::SocketAddr;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

/// One discovery attempt. `outcome` is "success", "failed" or "error".
pub fn record_discovery(strategy: &str, outcome: &'static str) {
    metrics::counter!(
        "routing_discovery_total",
        "strategy" => strategy.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// `result` is "published", "unpublished" or "failed".
pub fn record_publish(result: &'static str) {
    metrics::counter!("routing_publish_total", "result" => result).increment(1);
}

pub fn record_admission(allowed: bool) {
    let decision = if allowed { "allowed" } else { "rejected" };
    metrics::counter!("routing_admission_total", "decision" => decision).increment(1);
}

pub fn record_jobs_running(count: usize) {
    metrics::gauge!("routing_jobs_running").set(count as f64);
}
