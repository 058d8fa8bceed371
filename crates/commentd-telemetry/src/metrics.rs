//! Prometheus metrics for commentd.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `commentd_connections_total` | Counter | `port`, `outcome` | Finished connections |
//! | `commentd_read_seconds` | Histogram | `port` | Time spent reading the request |
//! | `commentd_validate_seconds` | Histogram | `port` | Time spent validating UTF-8 |
//! | `commentd_write_seconds` | Histogram | `port` | Time spent writing the comment file |
//! | `commentd_connection_seconds` | Histogram | `port` | Whole connection, accept to close |
//! | `commentd_request_size_bytes` | Histogram | `port` | Bytes read per request |
//! | `commentd_accept_errors_total` | Counter | `port` | Failed `accept` calls |
//! | `commentd_live_workers` | Gauge | - | Workers spawned and not yet reaped |
//!
//! Recording is a no-op until a recorder is installed with [`init_metrics`].

use std::net::SocketAddr;
use std::time::Duration;

use commentd_core::ConnectionOutcome;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Whether the Prometheus exporter is installed.
    pub enabled: bool,

    /// Address the exporter listens on (e.g., "0.0.0.0:9090").
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Durations measured while serving one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionTimings {
    /// Reading the request.
    pub read: Duration,
    /// The final UTF-8 validation.
    pub validate: Duration,
    /// Creating and writing the comment file.
    pub write: Duration,
    /// The whole connection.
    pub total: Duration,
}

/// Installs the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime so the listener can be spawned
/// onto it.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` if the address does not parse and
/// `TelemetryError::MetricsInit` if the exporter cannot be installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    register_metric_descriptions();

    Ok(())
}

fn register_metric_descriptions() {
    describe_counter!(
        "commentd_connections_total",
        "Total number of connections served, by outcome"
    );
    describe_histogram!(
        "commentd_read_seconds",
        "Time spent reading a request in seconds"
    );
    describe_histogram!(
        "commentd_validate_seconds",
        "Time spent validating a request in seconds"
    );
    describe_histogram!(
        "commentd_write_seconds",
        "Time spent writing a comment file in seconds"
    );
    describe_histogram!(
        "commentd_connection_seconds",
        "Total connection handling time in seconds"
    );
    describe_histogram!(
        "commentd_request_size_bytes",
        "Request size in bytes"
    );
    describe_counter!(
        "commentd_accept_errors_total",
        "Total number of failed accept calls"
    );
    describe_gauge!(
        "commentd_live_workers",
        "Number of port workers currently running"
    );
}

/// Records a finished connection.
///
/// Updates `commentd_connections_total` and the four timing histograms.
pub fn record_connection(port: u16, outcome: ConnectionOutcome, timings: &ConnectionTimings) {
    let port = port.to_string();

    counter!(
        "commentd_connections_total",
        "port" => port.clone(),
        "outcome" => outcome.as_str()
    )
    .increment(1);

    histogram!("commentd_read_seconds", "port" => port.clone()).record(timings.read);
    histogram!("commentd_validate_seconds", "port" => port.clone()).record(timings.validate);
    histogram!("commentd_write_seconds", "port" => port.clone()).record(timings.write);
    histogram!("commentd_connection_seconds", "port" => port).record(timings.total);
}

/// Records the size of a request.
pub fn record_request_size(port: u16, size_bytes: usize) {
    histogram!("commentd_request_size_bytes", "port" => port.to_string()).record(size_bytes as f64);
}

/// Records a failed `accept`.
pub fn record_accept_error(port: u16) {
    counter!("commentd_accept_errors_total", "port" => port.to_string()).increment(1);
}

/// Sets the live worker gauge.
pub fn set_live_workers(count: usize) {
    gauge!("commentd_live_workers").set(count as f64);
}
