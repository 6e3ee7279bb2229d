//! Prometheus metrics for join runs.

use std::net::SocketAddr;

use crate::constants::{DEFAULT_METRICS_PORT, METRICS_PORT_ENV_VAR};

pub fn init_metrics() {
    let port: u16 = std::env::var(METRICS_PORT_ENV_VAR)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_METRICS_PORT);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => {
            tracing::info!("Prometheus exporter listening on http://{}/metrics", addr);
        }
        Err(e) => {
            tracing::warn!("Prometheus exporter install failed (possibly already installed): {}", e);
        }
    }
}

/// Record that one input file was read
pub fn file_read(bytes: usize) {
    ::metrics::counter!("joiner_files_read_total").increment(1);
    ::metrics::histogram!("joiner_file_bytes").record(bytes as f64);
}

/// Record the size of a merged table
pub fn rows_joined(rows: usize) {
    ::metrics::counter!("joiner_rows_joined_total").increment(rows as u64);
}

/// Record that an artifact was produced
pub fn artifact_exported(format: &str, bytes: usize) {
    ::metrics::counter!("joiner_artifacts_total", "format" => format.to_string()).increment(1);
    ::metrics::histogram!("joiner_artifact_bytes", "format" => format.to_string())
        .record(bytes as f64);
}

/// Record a rejected or failed join
pub fn join_failed(reason: &'static str) {
    ::metrics::counter!("joiner_failures_total", "reason" => reason).increment(1);
}

/// Record the wall time of a full join
pub fn join_duration(secs: f64) {
    ::metrics::histogram!("joiner_join_duration_seconds").record(secs);
}
