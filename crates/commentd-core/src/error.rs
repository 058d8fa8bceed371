//! Error taxonomy for commentd.
//!
//! Every failure the server can hit while serving a connection or running a
//! worker is one [`CommentError`] variant. Connection-level variants map to
//! the response the client receives via [`CommentError::outcome`]; the rest
//! are handled by the worker or the supervisor.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::ConnectionOutcome;

/// Errors raised while accepting, reading, validating or persisting comments.
#[derive(Debug, Error)]
pub enum CommentError {
    /// Reading the request from the connection failed.
    #[error("failed to read request: {0}")]
    Io(#[source] io::Error),

    /// The request filled the request buffer.
    #[error("request of {read} bytes exceeds the {capacity} byte buffer")]
    TooLarge {
        /// Bytes read before giving up.
        read: usize,
        /// Request buffer capacity.
        capacity: usize,
    },

    /// The request is not well-formed UTF-8.
    #[error("request is not valid UTF-8 (after {read} bytes)")]
    InvalidUtf8 {
        /// Bytes read when the malformed sequence was seen.
        read: usize,
    },

    /// The peer closed the connection without sending anything.
    #[error("connection closed before any request bytes arrived")]
    EmptyRequest,

    /// The timestamp for the comment file name could not be formatted.
    #[error("could not format comment timestamp")]
    Timestamp,

    /// The comment file path could not be built.
    #[error("could not build comment path: {reason}")]
    Path {
        /// Why the path is unusable.
        reason: String,
    },

    /// The comment file could not be created.
    #[error("could not open comment file {path}: {source}")]
    FileOpen {
        /// Path of the comment file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The comment file was not completely written.
    #[error("could not write comment file {path}: {source}")]
    ShortWrite {
        /// Path of the comment file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Accepting a new connection failed.
    #[error("failed to accept connection on port {port}: {source}")]
    Accept {
        /// Listening port.
        port: u16,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The listening socket could not be bound.
    #[error("failed to bind port {port}: {source}")]
    Bind {
        /// Port that could not be bound.
        port: u16,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The bound socket could not start listening.
    #[error("failed to listen on port {port}: {source}")]
    Listen {
        /// Port that could not listen.
        port: u16,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A worker could not be started.
    #[error("failed to spawn worker for port {port}: {reason}")]
    Spawn {
        /// Port of the worker.
        port: u16,
        /// Why the worker was not started.
        reason: String,
    },
}

impl CommentError {
    /// Create a path error.
    pub fn path(reason: impl Into<String>) -> Self {
        Self::Path {
            reason: reason.into(),
        }
    }

    /// Create a spawn error.
    pub fn spawn(port: u16, reason: impl Into<String>) -> Self {
        Self::Spawn {
            port,
            reason: reason.into(),
        }
    }

    /// Returns the response outcome for connection-level errors.
    ///
    /// Worker and supervisor errors (`Accept`, `Bind`, `Listen`, `Spawn`)
    /// never reach a client and return `None`.
    #[must_use]
    pub fn outcome(&self) -> Option<ConnectionOutcome> {
        match self {
            Self::TooLarge { .. } => Some(ConnectionOutcome::TooLarge),
            Self::InvalidUtf8 { .. } => Some(ConnectionOutcome::InvalidUtf8),
            Self::Io(_)
            | Self::EmptyRequest
            | Self::Timestamp
            | Self::Path { .. }
            | Self::FileOpen { .. }
            | Self::ShortWrite { .. } => Some(ConnectionOutcome::ServerError),
            Self::Accept { .. } | Self::Bind { .. } | Self::Listen { .. } | Self::Spawn { .. } => {
                None
            }
        }
    }

    /// Returns `true` if this error stops the worker that hit it.
    #[must_use]
    pub fn is_fatal_to_worker(&self) -> bool {
        matches!(self, Self::Bind { .. } | Self::Listen { .. })
    }

    /// Get the error category for metrics.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::TooLarge { .. } => "too_large",
            Self::InvalidUtf8 { .. } => "invalid_utf8",
            Self::EmptyRequest => "empty_request",
            Self::Timestamp => "timestamp",
            Self::Path { .. } => "path",
            Self::FileOpen { .. } => "file_open",
            Self::ShortWrite { .. } => "short_write",
            Self::Accept { .. } => "accept",
            Self::Bind { .. } => "bind",
            Self::Listen { .. } => "listen",
            Self::Spawn { .. } => "spawn",
        }
    }
}

/// Result type for commentd operations.
pub type CommentResult<T> = Result<T, CommentError>;
