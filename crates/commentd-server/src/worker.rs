//! One listening port.
//!
//! A [`PortWorker`] owns one listening socket and serves accepted
//! connections one after another. Bind and listen failures end the worker;
//! accept failures are logged and the loop goes on. The loop only stops when
//! its [`ShutdownSignal`] is triggered, and never in the middle of a
//! connection.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

pub use commentd_core::DEFAULT_LISTEN_BACKLOG;
use commentd_core::{CommentError, CommentResult, DEFAULT_BUFFER_CAPACITY, DEFAULT_COMMENT_DIR};
use commentd_telemetry::metrics;
use tokio::net::{TcpListener, TcpSocket};

use crate::handler::ConnectionHandler;
use crate::shutdown::{ShutdownSignal, StopReason};
use crate::store::CommentStore;

/// Settings shared by every worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Address to bind.
    pub bind_ip: IpAddr,
    /// Backlog passed to `listen`.
    pub listen_backlog: u32,
    /// Request buffer capacity in bytes.
    pub buffer_capacity: usize,
    /// Directory receiving comment files.
    pub comment_dir: PathBuf,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            listen_backlog: DEFAULT_LISTEN_BACKLOG,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            comment_dir: PathBuf::from(DEFAULT_COMMENT_DIR),
        }
    }
}

/// How a worker's accept loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    /// The port the worker listened on.
    pub port: u16,
    /// Connections served.
    pub served: u64,
    /// The reason the loop stopped.
    pub reason: StopReason,
}

/// A bound listener and the handler serving its connections.
#[derive(Debug)]
pub struct PortWorker {
    port: u16,
    listener: TcpListener,
    handler: ConnectionHandler,
    shutdown: ShutdownSignal,
}

impl PortWorker {
    /// Binds `port` and starts listening.
    ///
    /// Port 0 binds an ephemeral port; see [`local_addr`](Self::local_addr).
    ///
    /// # Errors
    ///
    /// Returns `CommentError::Bind` if the socket cannot be created or bound
    /// and `CommentError::Listen` if it cannot listen.
    pub fn bind(config: &WorkerConfig, port: u16, shutdown: ShutdownSignal) -> CommentResult<Self> {
        let addr = SocketAddr::new(config.bind_ip, port);
        let bind_err = |source| CommentError::Bind { port, source };

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;

        let listener = socket
            .listen(config.listen_backlog)
            .map_err(|source| CommentError::Listen { port, source })?;

        let port = listener
            .local_addr()
            .map_err(|source| CommentError::Listen { port, source })?
            .port();

        tracing::info!(port, addr = %addr.ip(), "worker listening");

        let store = CommentStore::new(config.comment_dir.clone());
        Ok(Self {
            port,
            listener,
            handler: ConnectionHandler::new(port, config.buffer_capacity, store),
            shutdown,
        })
    }

    /// Binds `port` and runs the accept loop until `shutdown` is triggered.
    pub async fn serve(
        config: WorkerConfig,
        port: u16,
        shutdown: ShutdownSignal,
    ) -> CommentResult<WorkerExit> {
        let worker = match Self::bind(&config, port, shutdown) {
            Ok(worker) => worker,
            Err(err) => {
                tracing::error!(port, error = %err, "worker failed to start");
                return Err(err);
            }
        };
        Ok(worker.run().await)
    }

    /// The bound port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The bound address.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts and serves connections until the shutdown signal fires.
    pub async fn run(self) -> WorkerExit {
        let mut served = 0;

        while !self.shutdown.is_shutdown() {
            tokio::select! {
                biased;

                reason = self.shutdown.recv() => {
                    tracing::debug!(port = self.port, %reason, "accept interrupted by stop signal");
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(port = self.port, %peer, "connection accepted");
                        self.handler.handle(stream).await;
                        served += 1;
                    }
                    Err(source) => {
                        let err = CommentError::Accept { port: self.port, source };
                        tracing::warn!(port = self.port, error = %err, "accept failed");
                        metrics::record_accept_error(self.port);
                    }
                },
            }
        }

        let reason = self.shutdown.reason().unwrap_or(StopReason::Requested);
        tracing::info!(port = self.port, served, %reason, "worker stopped");

        WorkerExit {
            port: self.port,
            served,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commentd_core::ConnectionOutcome;
    use commentd_test::{fixtures, TestClient};
    use std::time::Duration;

    fn config(dir: &std::path::Path) -> WorkerConfig {
        WorkerConfig {
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            comment_dir: dir.to_path_buf(),
            ..WorkerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let dir = tempfile::tempdir().unwrap();
        let worker = PortWorker::bind(&config(dir.path()), 0, ShutdownSignal::new()).unwrap();

        assert_ne!(worker.port(), 0);
        assert_eq!(worker.local_addr().unwrap().port(), worker.port());
    }

    #[tokio::test]
    async fn test_bind_port_in_use() {
        let dir = tempfile::tempdir().unwrap();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = PortWorker::bind(&config(dir.path()), port, ShutdownSignal::new()).unwrap_err();
        assert!(err.is_fatal_to_worker());
    }

    #[tokio::test]
    async fn test_serve_reports_bind_failure() {
        let dir = tempfile::tempdir().unwrap();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let result = PortWorker::serve(config(dir.path()), port, ShutdownSignal::new()).await;
        assert!(matches!(result, Err(CommentError::Bind { .. } | CommentError::Listen { .. })));
    }

    #[tokio::test]
    async fn test_stop_before_run() {
        let dir = tempfile::tempdir().unwrap();
        let shutdown = ShutdownSignal::new();
        let worker = PortWorker::bind(&config(dir.path()), 0, shutdown.clone()).unwrap();

        shutdown.trigger(StopReason::HangUp);
        let exit = worker.run().await;

        assert_eq!(exit.served, 0);
        assert_eq!(exit.reason, StopReason::HangUp);
    }

    #[tokio::test]
    async fn test_stop_wakes_pending_accept() {
        let dir = tempfile::tempdir().unwrap();
        let shutdown = ShutdownSignal::new();
        let worker = PortWorker::bind(&config(dir.path()), 0, shutdown.clone()).unwrap();
        let run = tokio::spawn(worker.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger(StopReason::Terminate);

        let exit = tokio::time::timeout(Duration::from_secs(2), run)
            .await
            .expect("worker should stop")
            .unwrap();
        assert_eq!(exit.reason, StopReason::Terminate);
    }

    #[tokio::test]
    async fn test_serves_connections_serially() {
        let dir = tempfile::tempdir().unwrap();
        let shutdown = ShutdownSignal::new();
        let worker = PortWorker::bind(&config(dir.path()), 0, shutdown.clone()).unwrap();
        let client = TestClient::localhost(worker.port());
        let run = tokio::spawn(worker.run());

        let ok = client.send(&fixtures::post(b"first")).await.unwrap();
        assert_eq!(ok.outcome(), Some(ConnectionOutcome::Success));

        let bad = client
            .send_and_close(&fixtures::short_program_data())
            .await
            .unwrap();
        assert_eq!(bad.outcome(), Some(ConnectionOutcome::InvalidUtf8));

        shutdown.trigger(StopReason::Requested);
        let exit = run.await.unwrap();
        assert_eq!(exit.served, 2);
    }
}
