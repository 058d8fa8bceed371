//! Test error types.

use std::fmt;
use std::io;

/// Errors that can occur while talking to a server under test.
#[derive(Debug)]
pub enum TestError {
    /// Connecting, writing or reading failed
    Io(io::Error),
    /// The server closed the connection without responding
    EmptyResponse,
    /// The response could not be parsed
    Malformed(String),
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::EmptyResponse => write!(f, "Server closed the connection without a response"),
            Self::Malformed(msg) => write!(f, "Malformed response: {msg}"),
        }
    }
}

impl std::error::Error for TestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TestError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
