//! # commentd core
//!
//! Domain types shared by every commentd crate:
//!
//! - [`utf8`]: the byte-pattern UTF-8 validator applied to every request
//! - [`ConnectionOutcome`]: the four ways a connection can end, and the
//!   canned response each one sends
//! - [`CommentError`]: the error taxonomy used by the reader, the comment
//!   store, the port workers and the supervisor
//!
//! This crate performs no I/O.

#![doc(html_root_url = "https://docs.rs/commentd-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod outcome;
pub mod utf8;

pub use error::{CommentError, CommentResult};
pub use outcome::ConnectionOutcome;

/// Default request buffer capacity in bytes.
pub const DEFAULT_BUFFER_CAPACITY: usize = 8096;

/// Default directory comment files are written to.
pub const DEFAULT_COMMENT_DIR: &str = "comments";

/// Default `listen` backlog.
pub const DEFAULT_LISTEN_BACKLOG: u32 = 64;
