//! Metrics collection and Prometheus export.
//!
//! Initializes the metrics exporter and provides the /metrics endpoint handler.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics recorder.
///
/// Must be called once at startup before any metrics are recorded. A second
/// call is rejected with an error instead of replacing the recorder.
pub fn init_metrics() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;

    METRICS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("metrics handle already initialized"))
}

/// Get the current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}

pub fn record_ledger_sync(operation: &'static str, outcome: &'static str) {
    counter!("sales_ledger_sync_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
}

pub fn record_ledger_conflict() {
    counter!("sales_ledger_update_conflicts_total").increment(1);
}

pub fn record_collection_event(event: &'static str) {
    counter!("sales_cash_collection_events_total", "event" => event).increment(1);
}

pub fn record_duplicate_intake() {
    counter!("sales_record_duplicate_intake_total").increment(1);
}
