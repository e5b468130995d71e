//! Metrics implementation using Prometheus.

use agentgate_core::{Error, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize Prometheus recorder and return the handle.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle> {
    let builder = PrometheusBuilder::new();

    let handle = builder
        .install_recorder()
        .map_err(|e| Error::internal(format!("Failed to install Prometheus recorder: {}", e)))?;

    tracing::info!("Prometheus metrics recorder initialized");
    Ok(handle)
}

/// Track one gate decision (outcome is "allowed", "denied", or
/// "pending_approval") and its end-to-end latency.
pub fn track_gate_decision(outcome: &str, latency_sec: f64) {
    metrics::counter!(
        "gate_decisions_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);

    metrics::histogram!("gate_decision_duration_seconds").record(latency_sec);
}

/// Track an approval request entering or leaving the PENDING state.
pub fn track_approval_event(event: &str) {
    metrics::counter!("approval_requests_total", "event" => event.to_string()).increment(1);
}
