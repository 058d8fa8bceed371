//! Connection outcomes and the canned responses they select.

use std::fmt;

use http::StatusCode;

const THANK_YOU: &[u8] = b"HTTP/1.1 200 OK\r\n\
Content-Type: text/html\r\n\
Connection: close\r\n\
\r\n\
<html><body>\
<h1>Thank you for your comment</h1>\
<p>Our editors will read your comment and decide whether it meets the \
comment guidelines.</p>\
</body></html>";

const TOO_LARGE: &[u8] = b"HTTP/1.1 413 Request Too Large\r\n\
Content-Type: text/html\r\n\
Connection: close\r\n\
\r\n\
<html><body>\
<h1>Your comment is too large</h1>\
<p>Long comments are papers in their own right. Please publish it \
elsewhere and send us a short comment with a reference to it.</p>\
</body></html>";

const INVALID_UTF8: &[u8] = b"HTTP/1.1 415 Invalid UTF-8\r\n\
Content-Type: text/html\r\n\
Connection: close\r\n\
\r\n\
<html><body>\
<h1>Your comment is not valid UTF-8</h1>\
<p>We only accept comments encoded as UTF-8.</p>\
</body></html>";

const SERVER_ERROR: &[u8] = b"HTTP/1.1 500 Server Error\r\n\
Content-Type: text/html\r\n\
Connection: close\r\n\
\r\n\
<html><body>\
<h1>Sorry, we could not record your comment</h1>\
<p>Something went wrong on our side. Please try again later.</p>\
</body></html>";

/// The result of serving one connection.
///
/// Every connection ends with exactly one outcome, and each outcome maps to
/// one fixed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionOutcome {
    /// The comment was validated and persisted.
    Success,
    /// The request filled the request buffer.
    TooLarge,
    /// The request bytes are not well-formed UTF-8.
    InvalidUtf8,
    /// Reading or persisting the comment failed.
    ServerError,
}

impl ConnectionOutcome {
    /// All outcomes, in response-code order.
    pub const ALL: [Self; 4] = [
        Self::Success,
        Self::TooLarge,
        Self::InvalidUtf8,
        Self::ServerError,
    ];

    /// Returns the HTTP status sent for this outcome.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,
            Self::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InvalidUtf8 => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the complete response (status line, headers and HTML body).
    #[must_use]
    pub const fn response(self) -> &'static [u8] {
        match self {
            Self::Success => THANK_YOU,
            Self::TooLarge => TOO_LARGE,
            Self::InvalidUtf8 => INVALID_UTF8,
            Self::ServerError => SERVER_ERROR,
        }
    }

    /// Returns a short label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::TooLarge => "too_large",
            Self::InvalidUtf8 => "invalid_utf8",
            Self::ServerError => "server_error",
        }
    }

    /// Returns `true` for [`ConnectionOutcome::Success`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for ConnectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
