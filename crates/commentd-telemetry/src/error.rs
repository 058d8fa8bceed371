//! Telemetry errors.

use std::path::PathBuf;

use thiserror::Error;

/// Logging or metrics could not be set up.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The Prometheus exporter could not be installed.
    #[error("cannot start metrics exporter: {0}")]
    MetricsInit(String),

    /// The log filter is invalid or a subscriber is already installed.
    #[error("cannot start logging: {0}")]
    LoggingInit(String),

    /// The metrics listen address does not parse.
    #[error("bad metrics address {0}")]
    InvalidAddress(String),

    /// `commentd.log` could not be opened in the log directory.
    #[error("cannot open log file {path}: {source}")]
    LogFile {
        /// Path of the log file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}
