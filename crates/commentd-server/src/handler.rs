//! Serving one accepted connection.
//!
//! The pipeline is read, check size, validate, persist, respond. Each step
//! is a gate: the first failure picks the response and skips the rest. The
//! response is always written and the connection always shut down.

use std::time::Instant;

use commentd_core::{CommentError, CommentResult, ConnectionOutcome};
use commentd_telemetry::metrics;
use commentd_telemetry::ConnectionTimings;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::reader::{read_request, RequestBuffer};
use crate::store::{CommentRecord, CommentStore};

/// Serves connections for one port.
#[derive(Debug, Clone)]
pub struct ConnectionHandler {
    port: u16,
    capacity: usize,
    store: CommentStore,
}

impl ConnectionHandler {
    /// Creates a handler for connections accepted on `port`, reading into
    /// buffers of `capacity` bytes.
    pub fn new(port: u16, capacity: usize, store: CommentStore) -> Self {
        Self {
            port,
            capacity,
            store,
        }
    }

    /// The port whose connections this handler serves.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serves one connection and returns how it ended.
    pub async fn handle<S>(&self, mut stream: S) -> ConnectionOutcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let started = Instant::now();
        let mut timings = ConnectionTimings::default();
        let mut buffer = RequestBuffer::new(self.capacity);

        let result = self.process(&mut stream, &mut buffer, &mut timings).await;
        let outcome = match &result {
            Ok(record) => {
                tracing::info!(
                    port = self.port,
                    path = %record.path.display(),
                    bytes = record.len,
                    "comment stored"
                );
                ConnectionOutcome::Success
            }
            Err(err) => {
                let outcome = err.outcome().unwrap_or(ConnectionOutcome::ServerError);
                if outcome == ConnectionOutcome::ServerError {
                    tracing::error!(
                        port = self.port,
                        error = %err,
                        kind = err.category(),
                        "request failed"
                    );
                } else {
                    tracing::warn!(
                        port = self.port,
                        error = %err,
                        kind = err.category(),
                        "request rejected"
                    );
                }
                outcome
            }
        };

        if let Err(e) = stream.write_all(outcome.response()).await {
            tracing::warn!(port = self.port, error = %e, "failed to send response");
        }
        if let Err(e) = stream.shutdown().await {
            tracing::debug!(port = self.port, error = %e, "failed to shut down connection");
        }

        timings.total = started.elapsed();
        tracing::debug!(
            port = self.port,
            outcome = %outcome,
            read = ?timings.read,
            validate = ?timings.validate,
            write = ?timings.write,
            total = ?timings.total,
            "connection timings"
        );
        metrics::record_connection(self.port, outcome, &timings);

        outcome
    }

    async fn process<S>(
        &self,
        stream: &mut S,
        buffer: &mut RequestBuffer,
        timings: &mut ConnectionTimings,
    ) -> CommentResult<CommentRecord>
    where
        S: AsyncRead + Unpin,
    {
        let step = Instant::now();
        let read = read_request(stream, buffer).await;
        timings.read = step.elapsed();

        let read = read?;
        metrics::record_request_size(self.port, read);

        if read == 0 {
            return Err(CommentError::EmptyRequest);
        }
        if read >= buffer.capacity() {
            return Err(CommentError::TooLarge {
                read,
                capacity: buffer.capacity(),
            });
        }

        let step = Instant::now();
        let valid = buffer.is_valid_utf8();
        timings.validate = step.elapsed();
        if !valid {
            return Err(CommentError::InvalidUtf8 { read });
        }

        let step = Instant::now();
        let record = self.store.persist(self.port, buffer.as_bytes()).await;
        timings.write = step.elapsed();
        record
    }
}
