//! Configuration types.
//!
//! This module provides the top-level [`CommentdConfig`] struct, its sections
//! and its builder.

use std::collections::BTreeSet;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use commentd_core::{DEFAULT_BUFFER_CAPACITY, DEFAULT_COMMENT_DIR, DEFAULT_LISTEN_BACKLOG};

use crate::ConfigError;

/// Complete commentd configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from files
/// and environment variables.
///
/// # Example
///
/// ```
/// use commentd_config::CommentdConfig;
///
/// let config = CommentdConfig::default();
/// assert_eq!(config.server.ports, vec![8080]);
/// assert_eq!(config.server.buffer_capacity, 8096);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct CommentdConfig {
    /// Listener configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Where comments and logs are written.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging and metrics configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfigSection,
}

impl CommentdConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use commentd_config::CommentdConfig;
    ///
    /// let config = CommentdConfig::builder()
    ///     .ports([8080, 8081])
    ///     .comment_dir("/var/lib/commentd")
    ///     .build();
    ///
    /// assert_eq!(config.server.ports, vec![8080, 8081]);
    /// ```
    #[must_use]
    pub fn builder() -> CommentdConfigBuilder {
        CommentdConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - No port is configured, a port is 0, or a port appears twice
    /// - The bind address is not an IP address
    /// - The buffer capacity is below 2 bytes or the backlog is 0
    /// - The comment directory is empty
    /// - Metrics are enabled with an unparsable address
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.ports.is_empty() {
            return Err(ConfigError::invalid_value(
                "server.ports",
                "at least one port is required",
            ));
        }

        let mut seen = BTreeSet::new();
        for &port in &self.server.ports {
            if port == 0 {
                return Err(ConfigError::invalid_value(
                    "server.ports",
                    "port 0 is not allowed",
                ));
            }
            if !seen.insert(port) {
                return Err(ConfigError::invalid_value(
                    "server.ports",
                    format!("duplicate port {port}"),
                ));
            }
        }

        self.server.ip()?;

        // One byte of the buffer is reserved, so a 1-byte buffer accepts nothing.
        if self.server.buffer_capacity < 2 {
            return Err(ConfigError::invalid_value(
                "server.buffer_capacity",
                "must be at least 2 bytes",
            ));
        }

        if self.server.listen_backlog == 0 {
            return Err(ConfigError::invalid_value(
                "server.listen_backlog",
                "must be at least 1",
            ));
        }

        if self.storage.comment_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid_value(
                "storage.comment_dir",
                "must not be empty",
            ));
        }

        if self.telemetry.metrics.enabled
            && self
                .telemetry
                .metrics
                .addr
                .parse::<SocketAddr>()
                .is_err()
        {
            return Err(ConfigError::invalid_value(
                "telemetry.metrics.addr",
                format!("invalid socket address: {}", self.telemetry.metrics.addr),
            ));
        }

        Ok(())
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// IP address every worker binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Ports to listen on, one worker per port.
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,

    /// Request buffer capacity in bytes. The largest accepted request is one
    /// byte smaller.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Listen backlog for each worker socket.
    #[serde(default = "default_listen_backlog")]
    pub listen_backlog: u32,
}

impl ServerConfig {
    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `bind_addr` is not an IP address.
    pub fn ip(&self) -> Result<IpAddr, ConfigError> {
        self.bind_addr.parse().map_err(|_| {
            ConfigError::invalid_value(
                "server.bind_addr",
                format!("invalid IP address: {}", self.bind_addr),
            )
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            ports: default_ports(),
            buffer_capacity: default_buffer_capacity(),
            listen_backlog: default_listen_backlog(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_ports() -> Vec<u16> {
    vec![8080]
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

fn default_listen_backlog() -> u32 {
    DEFAULT_LISTEN_BACKLOG
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory comment files are written to.
    #[serde(default = "default_comment_dir")]
    pub comment_dir: PathBuf,

    /// Directory the log file is written to; logs go to stdout when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            comment_dir: default_comment_dir(),
            log_dir: None,
        }
    }
}

fn default_comment_dir() -> PathBuf {
    PathBuf::from(DEFAULT_COMMENT_DIR)
}

/// Telemetry configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfigSection {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs.
    #[default]
    Json,
    /// Human-readable pretty format.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level or filter directive (e.g. "info", "commentd_server=debug").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include ANSI color codes in output.
    #[serde(default)]
    pub ansi_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            ansi_enabled: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Expose a Prometheus scrape endpoint.
    #[serde(default)]
    pub enabled: bool,

    /// Address of the scrape endpoint.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_true() -> bool {
    true
}

/// Builder for [`CommentdConfig`].
#[derive(Debug, Clone, Default)]
pub struct CommentdConfigBuilder {
    config: CommentdConfig,
}

impl CommentdConfigBuilder {
    /// Creates a builder starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bind address.
    #[must_use]
    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.server.bind_addr = addr.into();
        self
    }

    /// Sets the ports to listen on.
    #[must_use]
    pub fn ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.config.server.ports = ports.into_iter().collect();
        self
    }

    /// Sets the request buffer capacity.
    #[must_use]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.server.buffer_capacity = capacity;
        self
    }

    /// Sets the comment directory.
    #[must_use]
    pub fn comment_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage.comment_dir = dir.into();
        self
    }

    /// Sets the log directory.
    #[must_use]
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage.log_dir = Some(dir.into());
        self
    }

    /// Sets the logging configuration.
    #[must_use]
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.config.telemetry.logging = logging;
        self
    }

    /// Sets the metrics configuration.
    #[must_use]
    pub fn metrics(mut self, metrics: MetricsConfig) -> Self {
        self.config.telemetry.metrics = metrics;
        self
    }

    /// Builds the configuration without validating it.
    #[must_use]
    pub fn build(self) -> CommentdConfig {
        self.config
    }
}
