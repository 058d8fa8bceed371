//! Structured logging for commentd.
//!
//! Builds a `tracing-subscriber` registry with an [`EnvFilter`] and a single
//! `fmt` layer, JSON by default. When a log directory is configured, events
//! are appended to [`LOG_FILE_NAME`] inside it instead of going to stdout.
//!
//! # Example
//!
//! ```rust,ignore
//! use commentd_telemetry::logging::{LogConfig, init_logging};
//!
//! init_logging(&LogConfig::default())?;
//! tracing::info!(port = 8080, "worker listening");
//! ```

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Name of the log file created inside the log directory.
pub const LOG_FILE_NAME: &str = "commentd.log";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Log level or filter directive (e.g. "info", "commentd_server=debug").
    pub level: String,

    /// Whether to output JSON format.
    pub json_format: bool,

    /// Whether to color output. Ignored when writing to a file.
    pub ansi: bool,

    /// Whether to include target (module path).
    pub include_target: bool,

    /// Directory receiving [`LOG_FILE_NAME`]; stdout when `None`.
    pub log_dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            ansi: false,
            include_target: true,
            log_dir: None,
        }
    }
}

impl LogConfig {
    /// Path of the log file, if logging goes to a directory.
    #[must_use]
    pub fn log_file_path(&self) -> Option<PathBuf> {
        self.log_dir.as_deref().map(|dir| dir.join(LOG_FILE_NAME))
    }
}

/// Opens `path` for appending, creating it if needed.
pub fn open_log_file(path: &Path) -> TelemetryResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| TelemetryError::LogFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Initializes the logging subsystem.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` if the filter is invalid or a global
/// subscriber is already installed, and `TelemetryError::LogFile` if the log
/// file cannot be opened.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;

    let (writer, ansi) = match config.log_file_path() {
        Some(path) => {
            let file = open_log_file(&path)?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stdout), config.ansi),
    };

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    Ok(())
}

/// Creates an env filter from a string.
///
/// # Errors
///
/// Returns error if the filter string is invalid.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter)
        .map_err(|e| TelemetryError::LoggingInit(format!("Invalid log level: {e}")))
}
