//! # commentd
//!
//! A minimal comment listener. Every configured port gets its own worker;
//! each connection's raw bytes are checked against the buffer capacity and
//! for UTF-8 validity, stored as `<YYYY-MM-DD_HH-MM-SS>_<port>.comment` in
//! the comment directory, and answered with one of four canned responses.
//!
//! | Outcome        | Status |
//! |----------------|--------|
//! | stored         | 200    |
//! | too large      | 413    |
//! | invalid UTF-8  | 415    |
//! | anything else  | 500    |
//!
//! SIGINT, SIGHUP and SIGTERM stop every worker; the process exits once all
//! of them have been reaped.
//!
//! This crate holds the binary's argument parsing and startup wiring. The
//! listener itself lives in `commentd-server`.

#![doc(html_root_url = "https://docs.rs/commentd/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod app;
pub mod cli;

pub use app::{load_config, run, telemetry_config, worker_config, AppError, DEFAULT_CONFIG_FILE};
pub use cli::{Args, CliError, Command, USAGE};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
