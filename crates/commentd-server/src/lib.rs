//! # commentd server
//!
//! The runtime of the comment listener: one [`PortWorker`] per port, each
//! serving connections one at a time through a [`ConnectionHandler`], all
//! started, stopped and reaped by a [`WorkerSupervisor`].
//!
//! ## Connection pipeline
//!
//! 1. [`read_request`] fills a zeroed [`RequestBuffer`], following
//!    `Expect: 100-continue` across reads and failing fast on bad UTF-8
//! 2. the request is checked against the buffer capacity and validated
//! 3. [`CommentStore`] writes it to `<dir>/<YYYY-MM-DD_HH-MM-SS>_<port>.comment`
//! 4. one canned response is sent and the connection is shut down
//!
//! ## Example
//!
//! ```rust,ignore
//! use commentd_server::{WorkerConfig, WorkerSupervisor};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let supervisor = WorkerSupervisor::new(WorkerConfig::default(), vec![8080, 8081]);
//!     let report = supervisor.run_with_os_signals().await?;
//!     println!("{report:?}");
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/commentd-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod handler;
pub mod reader;
pub mod shutdown;
pub mod store;
pub mod supervisor;
pub mod worker;

pub use handler::ConnectionHandler;
pub use reader::{expects_continue, read_request, RequestBuffer};
pub use shutdown::{OsSignals, ShutdownSignal, StopReason};
pub use store::{CommentRecord, CommentStore};
pub use supervisor::{
    SupervisorHandle, SupervisorReport, WorkerRecord, WorkerRegistry, WorkerState, WorkerStatus,
    WorkerSupervisor,
};
pub use worker::{PortWorker, WorkerConfig, WorkerExit, DEFAULT_LISTEN_BACKLOG};
