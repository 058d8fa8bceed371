//! Raw TCP client for exercising a running commentd worker.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::TestError;
use crate::response::TestResponse;

/// Default pause between the headers and the body of a continuation request.
pub const DEFAULT_CONTINUE_DELAY: Duration = Duration::from_millis(100);

/// Default time to keep retrying a refused connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A test client that sends one request per connection and reads the
/// response until the server closes.
///
/// # Example
///
/// ```ignore
/// use commentd_test::{fixtures, TestClient};
///
/// let client = TestClient::localhost(8080);
/// let response = client.send(&fixtures::post(b"hello")).await?;
/// assert_eq!(response.status_code(), 200);
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct TestClient {
    addr: SocketAddr,
    continue_delay: Duration,
    connect_timeout: Duration,
}

impl TestClient {
    /// Creates a client for `addr`.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            continue_delay: DEFAULT_CONTINUE_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Creates a client for `127.0.0.1:port`.
    pub fn localhost(port: u16) -> Self {
        Self::new(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
    }

    /// Sets the pause used by [`send_with_continue`](Self::send_with_continue).
    pub fn with_continue_delay(mut self, delay: Duration) -> Self {
        self.continue_delay = delay;
        self
    }

    /// Sets how long refused connections are retried, for workers that are
    /// still binding.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Returns the server address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Sends `request` in one write and reads the response.
    pub async fn send(&self, request: &[u8]) -> Result<TestResponse, TestError> {
        let mut stream = self.connect().await?;
        stream.write_all(request).await?;
        read_response(&mut stream).await
    }

    /// Sends `request`, closes the write half, and reads the response.
    pub async fn send_and_close(&self, request: &[u8]) -> Result<TestResponse, TestError> {
        let mut stream = self.connect().await?;
        stream.write_all(request).await?;
        stream.shutdown().await?;
        read_response(&mut stream).await
    }

    /// Sends `head`, pauses like a client waiting for `100 Continue`, then
    /// sends `body` and reads the response.
    pub async fn send_with_continue(
        &self,
        head: &[u8],
        body: &[u8],
    ) -> Result<TestResponse, TestError> {
        let mut stream = self.connect().await?;
        stream.write_all(head).await?;
        stream.flush().await?;
        tokio::time::sleep(self.continue_delay).await;
        stream.write_all(body).await?;
        read_response(&mut stream).await
    }

    /// Connects and closes without sending anything, returning whatever the
    /// server answers.
    pub async fn send_nothing(&self) -> Result<TestResponse, TestError> {
        let mut stream = self.connect().await?;
        stream.shutdown().await?;
        read_response(&mut stream).await
    }

    async fn connect(&self) -> Result<TcpStream, TestError> {
        let deadline = Instant::now() + self.connect_timeout;
        loop {
            match TcpStream::connect(self.addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) if e.kind() == io::ErrorKind::ConnectionRefused && Instant::now() < deadline => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

// The server closes with unread request bytes pending when it rejects an
// oversized request, so a reset after the response arrived still counts.
async fn read_response(stream: &mut TcpStream) -> Result<TestResponse, TestError> {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => raw.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset && !raw.is_empty() => break,
            Err(e) => return Err(e.into()),
        }
    }
    TestResponse::parse(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use commentd_core::ConnectionOutcome;
    use http::StatusCode;
    use tokio::net::TcpListener;

    // Accepts one connection, records every read until EOF or a pause, and
    // answers with `response`.
    async fn one_shot_server(
        response: &'static [u8],
    ) -> (SocketAddr, tokio::task::JoinHandle<Vec<Vec<u8>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut reads = Vec::new();
            let mut buf = [0u8; 8192];
            loop {
                let read = tokio::time::timeout(Duration::from_millis(300), stream.read(&mut buf));
                match read.await {
                    Ok(Ok(0)) | Err(_) => break,
                    Ok(Ok(n)) => reads.push(buf[..n].to_vec()),
                    Ok(Err(e)) => panic!("read failed: {e}"),
                }
            }
            stream.write_all(response).await.unwrap();
            stream.shutdown().await.unwrap();
            reads
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn test_send() {
        let (addr, server) = one_shot_server(ConnectionOutcome::Success.response()).await;

        let response = TestClient::new(addr).send(b"hello").await.unwrap();
        response.assert_status(StatusCode::OK);

        let reads = server.await.unwrap();
        assert_eq!(reads.concat(), b"hello");
    }

    #[tokio::test]
    async fn test_send_and_close() {
        let (addr, server) = one_shot_server(ConnectionOutcome::TooLarge.response()).await;

        let response = TestClient::new(addr).send_and_close(b"abc").await.unwrap();
        assert_eq!(response.outcome(), Some(ConnectionOutcome::TooLarge));
        assert_eq!(server.await.unwrap().concat(), b"abc");
    }

    #[tokio::test]
    async fn test_send_with_continue_splits_reads() {
        let (addr, server) = one_shot_server(ConnectionOutcome::Success.response()).await;

        let response = TestClient::new(addr)
            .with_continue_delay(Duration::from_millis(100))
            .send_with_continue(b"HEAD\r\n\r\n", b"BODY")
            .await
            .unwrap();
        response.assert_status(StatusCode::OK);

        let reads = server.await.unwrap();
        assert_eq!(reads, vec![b"HEAD\r\n\r\n".to_vec(), b"BODY".to_vec()]);
    }

    #[tokio::test]
    async fn test_connect_refused_times_out() {
        let port = crate::free_port().unwrap();
        let result = TestClient::localhost(port)
            .with_connect_timeout(Duration::from_millis(50))
            .send(b"x")
            .await;
        assert!(matches!(result, Err(TestError::Io(_))));
    }
}
