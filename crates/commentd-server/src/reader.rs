//! Incremental request reading.
//!
//! A request normally arrives in one read. A client that sent
//! `Expect: 100-continue` sends its headers first and the body after a
//! pause; when the chunk just read carries that header the reader keeps
//! reading into the rest of the buffer. No `100 Continue` reply is sent.
//!
//! Only the latest chunk is searched for the header. A client that sends
//! `Expect: 100-continue` together with its whole body in one write gets
//! another read, which returns once the client closes its side of the
//! connection; the request then ends at EOF.

use commentd_core::{utf8, CommentError, CommentResult};
use tokio::io::{AsyncRead, AsyncReadExt};

const EXPECT_HEADER: &[u8] = b"expect:";
const CONTINUE_TOKEN: &[u8] = b"100-continue";

/// A fixed-capacity, zero-initialised request buffer.
///
/// The last byte is reserved as a terminator: at most `capacity - 1` bytes
/// are ever accepted, so the bytes after the filled region are always zero.
#[derive(Debug, Clone)]
pub struct RequestBuffer {
    bytes: Box<[u8]>,
    filled: usize,
}

impl RequestBuffer {
    /// Allocates a zeroed buffer of `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity].into_boxed_slice(),
            filled: 0,
        }
    }

    /// Total capacity, terminator slot included.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Number of bytes filled.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filled
    }

    /// Returns `true` if nothing has been read.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// The filled bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.filled]
    }

    /// Zeroes the buffer and resets the cursor.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
        self.filled = 0;
    }

    /// Validates the filled bytes, including the embedded-NUL guard.
    #[must_use]
    pub fn is_valid_utf8(&self) -> bool {
        utf8::validate(&self.bytes, self.filled)
    }
}

/// Reads one request from `conn` into `buffer`.
///
/// Returns the number of bytes read, which is zero if the peer closed
/// without sending anything.
///
/// # Errors
///
/// - [`CommentError::Io`] if a read fails; the buffer is cleared
/// - [`CommentError::TooLarge`] once the cumulative count reaches the
///   capacity; the buffer is cleared
/// - [`CommentError::InvalidUtf8`] as soon as the bytes read so far are
///   malformed, without reading further
pub async fn read_request<R>(conn: &mut R, buffer: &mut RequestBuffer) -> CommentResult<usize>
where
    R: AsyncRead + Unpin,
{
    buffer.clear();
    let capacity = buffer.capacity();

    loop {
        let start = buffer.filled;
        let read = match conn.read(&mut buffer.bytes[start..]).await {
            Ok(read) => read,
            Err(e) => {
                buffer.clear();
                return Err(CommentError::Io(e));
            }
        };

        if read == 0 {
            return Ok(buffer.filled);
        }
        buffer.filled += read;

        if buffer.filled >= capacity {
            let read = buffer.filled;
            buffer.clear();
            return Err(CommentError::TooLarge { read, capacity });
        }

        if !buffer.is_valid_utf8() {
            return Err(CommentError::InvalidUtf8 {
                read: buffer.filled,
            });
        }

        let chunk = &buffer.bytes[start..buffer.filled];
        if !expects_continue(chunk) {
            return Ok(buffer.filled);
        }
        tracing::trace!(read = buffer.filled, "expect 100-continue, reading body");
    }
}

/// Returns `true` if `chunk` holds an `Expect:` header (any case) whose
/// value contains `100-continue`.
#[must_use]
pub fn expects_continue(chunk: &[u8]) -> bool {
    let mut rest = chunk;
    while let Some(at) = find_ignore_case(rest, EXPECT_HEADER) {
        let value = &rest[at + EXPECT_HEADER.len()..];
        let line_end = value
            .iter()
            .position(|&b| b == b'\n')
            .unwrap_or(value.len());
        if find_ignore_case(&value[..line_end], CONTINUE_TOKEN).is_some() {
            return true;
        }
        rest = value;
    }
    false
}

fn find_ignore_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio_test::io::Builder;

    const CONTINUE_HEAD: &[u8] = b"POST / HTTP/1.1\r\nExpect: 100-continue\r\n\r\n";

    #[test]
    fn test_expects_continue() {
        assert!(expects_continue(CONTINUE_HEAD));
        assert!(expects_continue(b"EXPECT: 100-Continue\r\n"));
        assert!(expects_continue(b"expect:100-continue"));
        assert!(!expects_continue(b"POST / HTTP/1.1\r\n\r\nhello"));
        assert!(!expects_continue(b"Expect: something-else\r\n"));
        assert!(!expects_continue(b""));
    }

    #[test]
    fn test_expects_continue_value_must_be_on_header_line() {
        assert!(!expects_continue(b"Expect: nothing\r\nX-Note: 100-continue\r\n"));
        assert!(expects_continue(
            b"Expect: nothing\r\nExpect: 100-continue\r\n"
        ));
    }

    #[test]
    fn test_buffer_starts_zeroed() {
        let buffer = RequestBuffer::new(16);
        assert_eq!(buffer.capacity(), 16);
        assert!(buffer.is_empty());
        assert!(buffer.as_bytes().is_empty());
        assert!(buffer.is_valid_utf8());
    }

    #[tokio::test]
    async fn test_single_read() {
        let mut conn = Builder::new().read(b"hello comment").build();
        let mut buffer = RequestBuffer::new(64);

        let read = read_request(&mut conn, &mut buffer).await.unwrap();
        assert_eq!(read, 13);
        assert_eq!(buffer.as_bytes(), b"hello comment");
    }

    #[tokio::test]
    async fn test_continue_reads_body() {
        let mut conn = Builder::new()
            .read(CONTINUE_HEAD)
            .read(b"the body")
            .build();
        let mut buffer = RequestBuffer::new(256);

        let read = read_request(&mut conn, &mut buffer).await.unwrap();
        assert_eq!(read, CONTINUE_HEAD.len() + 8);
        assert!(buffer.as_bytes().ends_with(b"\r\n\r\nthe body"));
    }

    #[tokio::test]
    async fn test_continue_then_close() {
        let mut conn = Builder::new().read(CONTINUE_HEAD).build();
        let mut buffer = RequestBuffer::new(256);

        let read = read_request(&mut conn, &mut buffer).await.unwrap();
        assert_eq!(read, CONTINUE_HEAD.len());
    }

    #[tokio::test]
    async fn test_continue_with_body_in_same_chunk_ends_at_eof() {
        let request = [CONTINUE_HEAD, b"the body".as_slice()].concat();
        let mut conn = Builder::new()
            .read(&request)
            .wait(Duration::from_millis(20))
            .build();
        let mut buffer = RequestBuffer::new(256);

        let read = read_request(&mut conn, &mut buffer).await.unwrap();
        assert_eq!(read, request.len());
        assert_eq!(buffer.as_bytes(), request.as_slice());
    }

    #[tokio::test]
    async fn test_empty_request() {
        let mut conn = Builder::new().build();
        let mut buffer = RequestBuffer::new(64);

        assert_eq!(read_request(&mut conn, &mut buffer).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_error_clears_buffer() {
        let mut conn = Builder::new()
            .read(CONTINUE_HEAD)
            .read_error(io::Error::from(io::ErrorKind::ConnectionReset))
            .build();
        let mut buffer = RequestBuffer::new(256);

        let err = read_request(&mut conn, &mut buffer).await.unwrap_err();
        assert!(matches!(err, CommentError::Io(_)));
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_filling_capacity_is_too_large() {
        let mut conn = Builder::new().read(b"12345678").build();
        let mut buffer = RequestBuffer::new(8);

        let err = read_request(&mut conn, &mut buffer).await.unwrap_err();
        assert!(matches!(
            err,
            CommentError::TooLarge {
                read: 8,
                capacity: 8
            }
        ));
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_one_below_capacity_is_accepted() {
        let mut conn = Builder::new().read(b"1234567").build();
        let mut buffer = RequestBuffer::new(8);

        assert_eq!(read_request(&mut conn, &mut buffer).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_too_large_across_reads() {
        let head = b"Expect: 100-continue\r\n";
        let mut conn = Builder::new().read(head).read(b"0123456789").build();
        let mut buffer = RequestBuffer::new(head.len() + 10);

        let err = read_request(&mut conn, &mut buffer).await.unwrap_err();
        assert!(matches!(err, CommentError::TooLarge { .. }));
    }

    #[tokio::test]
    async fn test_invalid_utf8() {
        let mut conn = Builder::new().read(&[b'h', b'i', 0xc2]).build();
        let mut buffer = RequestBuffer::new(64);

        let err = read_request(&mut conn, &mut buffer).await.unwrap_err();
        assert!(matches!(err, CommentError::InvalidUtf8 { read: 3 }));
    }

    #[tokio::test]
    async fn test_embedded_nul_is_invalid() {
        let mut conn = Builder::new().read(b"abc\0def").build();
        let mut buffer = RequestBuffer::new(64);

        let err = read_request(&mut conn, &mut buffer).await.unwrap_err();
        assert!(matches!(err, CommentError::InvalidUtf8 { .. }));
    }

    #[tokio::test]
    async fn test_invalid_utf8_fails_before_body_arrives() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let mut head = b"Expect: 100-continue\r\n".to_vec();
        head.push(0xff);
        client.write_all(&head).await.unwrap();

        // The client never sends the body nor closes: the reader must not
        // wait for it.
        let mut buffer = RequestBuffer::new(256);
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            read_request(&mut server, &mut buffer),
        )
        .await
        .expect("reader should fail fast");

        assert!(matches!(result, Err(CommentError::InvalidUtf8 { .. })));
    }

    #[tokio::test]
    async fn test_buffer_reused_between_requests() {
        let mut buffer = RequestBuffer::new(64);

        let mut conn = Builder::new().read(b"a much longer first request").build();
        read_request(&mut conn, &mut buffer).await.unwrap();

        let mut conn = Builder::new().read(b"short").build();
        read_request(&mut conn, &mut buffer).await.unwrap();
        assert_eq!(buffer.as_bytes(), b"short");
        assert!(buffer.is_valid_utf8());
    }
}
