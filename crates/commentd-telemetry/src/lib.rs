//! Observability for commentd.
//!
//! - **Logging**: structured JSON (or pretty) events via `tracing`, written to
//!   stdout or to `commentd.log` in the configured log directory
//! - **Metrics**: connection outcomes, stage timings and worker counts via the
//!   `metrics` facade, optionally exported in Prometheus format
//!
//! # Example
//!
//! ```rust,ignore
//! use commentd_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     init_telemetry(&TelemetryConfig::default()).expect("telemetry");
//!     tracing::info!("ready");
//! }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LOG_FILE_NAME};
pub use metrics::{init_metrics, ConnectionTimings, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Configuration for both telemetry subsystems.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Logging configuration.
    pub logging: LogConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}
