//! # commentd test
//!
//! Test utilities for commentd. Unlike an in-memory harness, these talk to a
//! real listening worker over TCP, since request framing depends on how
//! bytes arrive on the socket.
//!
//! ## Key Features
//!
//! - **TestClient**: plain send, send-then-close, and two-phase
//!   `Expect: 100-continue` sends
//! - **TestResponse**: status, headers and body parsed from the raw reply
//! - **Fixtures**: ASCII, multilingual UTF-8, and binary request bodies
//! - **Helpers**: free port discovery and comment file listing
//!
//! ## Example
//!
//! ```ignore
//! use commentd_test::{fixtures, TestClient};
//!
//! #[tokio::test]
//! async fn test_plain_comment() {
//!     let client = TestClient::localhost(port);
//!     let response = client.send(&fixtures::post(b"hi")).await.unwrap();
//!     assert_eq!(response.status_code(), 200);
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/commentd-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
pub mod fixtures;
mod response;

use std::io;
use std::net::{Ipv4Addr, TcpListener};
use std::path::{Path, PathBuf};

pub use client::{TestClient, DEFAULT_CONNECT_TIMEOUT, DEFAULT_CONTINUE_DELAY};
pub use error::TestError;
pub use response::TestResponse;

/// Extension of persisted comment files.
pub const COMMENT_EXTENSION: &str = "comment";

/// Returns a port that was free on the loopback interface a moment ago.
pub fn free_port() -> io::Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(listener.local_addr()?.port())
}

/// Lists the comment files in `dir`, sorted by name.
pub fn comment_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == COMMENT_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
