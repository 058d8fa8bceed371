//! Turning a loaded configuration into a running supervisor.

use std::io;

use commentd_config::{CommentdConfig, ConfigError, ConfigLoader, LogFormat, DEFAULT_ENV_PREFIX};
use commentd_server::{SupervisorReport, WorkerConfig, WorkerState, WorkerStatus, WorkerSupervisor};
use commentd_telemetry::{LogConfig, MetricsConfig, TelemetryConfig, TelemetryError};
use thiserror::Error;

use crate::cli::Args;

/// Startup and runtime failures of the binary.
#[derive(Debug, Error)]
pub enum AppError {
    /// The configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Logging or metrics could not be initialized.
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    /// Stop signals could not be registered.
    #[error("signal registration failed: {0}")]
    Signals(#[from] io::Error),

    /// One or more workers ended without being stopped.
    #[error("{0} worker(s) did not stop cleanly")]
    WorkersFailed(usize),
}

/// Configuration file read from the working directory when `--config` is
/// not given.
pub const DEFAULT_CONFIG_FILE: &str = "commentd.toml";

/// Loads `.env`, the configuration file, `COMMENTD__*` variables and the
/// positional arguments, later sources winning.
///
/// Without `--config`, [`DEFAULT_CONFIG_FILE`] is used if it exists.
pub fn load_config(args: &Args) -> Result<CommentdConfig, AppError> {
    let loader = ConfigLoader::new().with_dotenv();
    let loader = match &args.config {
        Some(path) => loader.with_file(path)?,
        None => loader.with_optional_file(DEFAULT_CONFIG_FILE)?,
    };

    let config = loader
        .with_env_prefix(DEFAULT_ENV_PREFIX)
        .load_with(|config| args.apply(config))?;
    Ok(config)
}

/// Telemetry settings for `config`.
pub fn telemetry_config(config: &CommentdConfig) -> TelemetryConfig {
    let logging = &config.telemetry.logging;
    TelemetryConfig {
        logging: LogConfig {
            enabled: logging.enabled,
            level: logging.level.clone(),
            json_format: logging.format == LogFormat::Json,
            ansi: logging.ansi_enabled,
            log_dir: config.storage.log_dir.clone(),
            ..LogConfig::default()
        },
        metrics: MetricsConfig {
            enabled: config.telemetry.metrics.enabled,
            addr: config.telemetry.metrics.addr.clone(),
        },
    }
}

/// Worker settings for `config`.
pub fn worker_config(config: &CommentdConfig) -> Result<WorkerConfig, ConfigError> {
    Ok(WorkerConfig {
        bind_ip: config.server.ip()?,
        listen_backlog: config.server.listen_backlog,
        buffer_capacity: config.server.buffer_capacity,
        comment_dir: config.storage.comment_dir.clone(),
    })
}

/// Runs one worker per configured port until a stop signal arrives and every
/// worker has been reaped.
pub async fn run(config: &CommentdConfig) -> Result<SupervisorReport, AppError> {
    let workers = worker_config(config)?;
    let supervisor = WorkerSupervisor::new(workers, config.server.ports.clone());
    let report = supervisor.run_with_os_signals().await?;

    log_report(&report);
    match failures(&report) {
        0 => Ok(report),
        n => Err(AppError::WorkersFailed(n)),
    }
}

/// Workers that ended any way other than a clean stop.
pub fn failures(report: &SupervisorReport) -> usize {
    report
        .workers
        .iter()
        .filter(|(_, state)| !matches!(state, WorkerState::Exited(WorkerStatus::Stopped(_))))
        .count()
}

fn log_report(report: &SupervisorReport) {
    for (port, state) in &report.workers {
        match state {
            WorkerState::Exited(WorkerStatus::Stopped(exit)) => {
                tracing::info!(port, served = exit.served, reason = %exit.reason, "worker reaped");
            }
            WorkerState::Exited(WorkerStatus::Failed(err)) => {
                tracing::error!(port, error = %err, "worker failed");
            }
            other => tracing::warn!(port, state = ?other, "worker did not stop cleanly"),
        }
    }
}
