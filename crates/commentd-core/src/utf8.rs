//! Byte-pattern UTF-8 validation.
//!
//! The validator checks that a buffer is a well-formed sequence of UTF-8
//! byte patterns: every lead byte announces a width of one to four bytes and
//! is followed by the remaining bytes of that width, each a continuation
//! byte (`10xxxxxx`).
//!
//! Only byte patterns are checked. Overlong encodings, surrogate
//! halves and code points above `U+10FFFF` all pass, which makes this a
//! superset of what [`std::str::from_utf8`] accepts.
//!
//! # Example
//!
//! ```rust
//! use commentd_core::utf8;
//!
//! let comment = "naïve café".as_bytes();
//! assert!(utf8::validate(comment, comment.len()));
//!
//! // A 2-byte lead with nothing after it.
//! assert!(!utf8::validate(&[0x68, 0xC2], 2));
//! ```

/// Classification of a byte by its high bits when read as a lead byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteClass {
    /// `0xxxxxxx`: a complete single-byte character.
    Ascii,
    /// `10xxxxxx`: only legal inside a multi-byte sequence.
    Continuation,
    /// `110xxxxx`, `1110xxxx` or `11110xxx`: starts a sequence of the given
    /// total width (2, 3 or 4 bytes).
    Lead(usize),
    /// `11111xxx`: matches no UTF-8 pattern.
    Illegal,
}

/// Classifies `byte` as it would be read at the start of a character.
#[must_use]
pub const fn classify(byte: u8) -> ByteClass {
    if byte & 0b1000_0000 == 0b0000_0000 {
        ByteClass::Ascii
    } else if byte & 0b1100_0000 == 0b1000_0000 {
        ByteClass::Continuation
    } else if byte & 0b1110_0000 == 0b1100_0000 {
        ByteClass::Lead(2)
    } else if byte & 0b1111_0000 == 0b1110_0000 {
        ByteClass::Lead(3)
    } else if byte & 0b1111_1000 == 0b1111_0000 {
        ByteClass::Lead(4)
    } else {
        ByteClass::Illegal
    }
}

/// Returns `true` if `byte` matches the continuation pattern `10xxxxxx`.
#[must_use]
pub const fn is_continuation(byte: u8) -> bool {
    byte & 0b1100_0000 == 0b1000_0000
}

/// Returns the number of bytes before the first zero byte, or the buffer
/// length when it contains no zero byte.
#[must_use]
pub fn terminated_len(buffer: &[u8]) -> usize {
    buffer
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(buffer.len())
}

/// Validates the first `length` bytes of `buffer`.
///
/// `length` must equal [`terminated_len`] of the buffer. A mismatch means
/// either an embedded NUL byte inside the request or a caller that lost track
/// of how much it filled, and both are reported as invalid. Bytes after the
/// terminator (the zeroed tail of a request buffer) are ignored.
///
/// The function is pure: it only reads its inputs, so repeated calls return
/// the same answer and it can be shared freely between workers.
#[must_use]
pub fn validate(buffer: &[u8], length: usize) -> bool {
    if terminated_len(buffer) != length {
        return false;
    }

    let bytes = &buffer[..length];
    let mut pos = 0;

    while pos < bytes.len() {
        let width = match classify(bytes[pos]) {
            ByteClass::Ascii => 1,
            ByteClass::Lead(width) => width,
            ByteClass::Continuation | ByteClass::Illegal => return false,
        };

        // Truncated sequence at the end of the buffer.
        let Some(tail) = bytes.get(pos + 1..pos + width) else {
            return false;
        };
        if !tail.iter().copied().all(is_continuation) {
            return false;
        }

        pos += width;
    }

    true
}
