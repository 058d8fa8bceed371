//! Typed configuration for commentd.
//!
//! Configuration is layered: built-in defaults, then an optional TOML or JSON
//! file, then environment variables, then validation.
//!
//! # Example
//!
//! ```no_run
//! use commentd_config::ConfigLoader;
//!
//! # fn main() -> Result<(), commentd_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()
//!     .with_optional_file("commentd.toml")?
//!     .with_env_prefix("COMMENTD")
//!     .load()?;
//!
//! println!("workers: {:?}", config.server.ports);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0"
//! ports = [8080, 8081]
//! buffer_capacity = 8096
//! listen_backlog = 64
//!
//! [storage]
//! comment_dir = "/var/lib/commentd/comments"
//! log_dir = "/var/log/commentd"
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [telemetry.metrics]
//! enabled = true
//! addr = "127.0.0.1:9090"
//! ```
//!
//! # Environment Variable Overrides
//!
//! - `COMMENTD__SERVER__PORTS=8080,8081`
//! - `COMMENTD__STORAGE__COMMENT_DIR=/srv/comments`
//! - `COMMENTD__TELEMETRY__LOGGING__LEVEL=debug`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;

pub use config::*;
pub use error::ConfigError;
pub use loader::{parse_ports, ConfigLoader, DEFAULT_ENV_PREFIX};
