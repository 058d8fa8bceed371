//! Parsed server response.

use bytes::Bytes;
use commentd_core::ConnectionOutcome;
use http::header::{HeaderName, HeaderValue};
use http::{header, HeaderMap, StatusCode};

use crate::error::TestError;

/// A response read off the wire, with helper methods for assertions.
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: StatusCode,
    reason: String,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Parses a raw `HTTP/1.x` response.
    pub fn parse(raw: &[u8]) -> Result<Self, TestError> {
        if raw.is_empty() {
            return Err(TestError::EmptyResponse);
        }

        let split = raw
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .ok_or_else(|| TestError::Malformed("missing end of headers".to_string()))?;
        let head = std::str::from_utf8(&raw[..split])
            .map_err(|e| TestError::Malformed(format!("head is not UTF-8: {e}")))?;
        let body = Bytes::copy_from_slice(&raw[split + 4..]);

        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap_or_default();
        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default();
        if !version.starts_with("HTTP/1.") {
            return Err(TestError::Malformed(format!(
                "bad status line: {status_line}"
            )));
        }
        let status = parts
            .next()
            .and_then(|code| StatusCode::from_bytes(code.as_bytes()).ok())
            .ok_or_else(|| TestError::Malformed(format!("bad status code: {status_line}")))?;
        let reason = parts.next().unwrap_or_default().to_string();

        let mut headers = HeaderMap::new();
        for line in lines {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| TestError::Malformed(format!("bad header line: {line}")))?;
            let name = HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|e| TestError::Malformed(e.to_string()))?;
            let value = HeaderValue::from_str(value.trim())
                .map_err(|e| TestError::Malformed(e.to_string()))?;
            headers.append(name, value);
        }

        Ok(Self {
            status,
            reason,
            headers,
            body,
        })
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns the reason phrase of the status line.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Returns a reference to the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the Content-Type header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as text, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Maps the status back to the outcome that selects it.
    #[must_use]
    pub fn outcome(&self) -> Option<ConnectionOutcome> {
        ConnectionOutcome::ALL
            .into_iter()
            .find(|outcome| outcome.status() == self.status)
    }

    /// Asserts that the status code equals the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status, expected,
            "Expected status {}, got {} ({})",
            expected, self.status, self.reason
        );
        self
    }

    /// Asserts that the body contains `needle`, ignoring ASCII case.
    ///
    /// # Panics
    ///
    /// Panics if the body does not contain `needle`.
    pub fn assert_body_contains(&self, needle: &str) -> &Self {
        let text = self.text();
        assert!(
            text.to_ascii_lowercase()
                .contains(&needle.to_ascii_lowercase()),
            "Expected body to contain {needle:?}, got {text:?}"
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canned_responses() {
        for outcome in ConnectionOutcome::ALL {
            let response = TestResponse::parse(outcome.response()).unwrap();
            assert_eq!(response.status(), outcome.status());
            assert_eq!(response.outcome(), Some(outcome));
            assert_eq!(response.content_type(), Some("text/html"));
            assert!(response.text().starts_with("<html>"));
        }
    }

    #[test]
    fn test_parse_reason_phrase() {
        let response = TestResponse::parse(ConnectionOutcome::InvalidUtf8.response()).unwrap();
        assert_eq!(response.reason(), "Invalid UTF-8");
        response
            .assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE)
            .assert_body_contains("NOT VALID UTF-8");
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(
            TestResponse::parse(b""),
            Err(TestError::EmptyResponse)
        ));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            TestResponse::parse(b"HTTP/1.1 200 OK\r\nno end"),
            Err(TestError::Malformed(_))
        ));
        assert!(matches!(
            TestResponse::parse(b"SMTP 220 ready\r\n\r\n"),
            Err(TestError::Malformed(_))
        ));
        assert!(matches!(
            TestResponse::parse(b"HTTP/1.1 abc OK\r\n\r\n"),
            Err(TestError::Malformed(_))
        ));
    }

    #[test]
    fn test_unknown_status_has_no_outcome() {
        let response = TestResponse::parse(b"HTTP/1.1 404 Not Found\r\n\r\n").unwrap();
        assert_eq!(response.outcome(), None);
        assert!(response.body().is_empty());
    }
}
