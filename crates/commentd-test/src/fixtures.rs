//! Request fixtures.
//!
//! Plain ASCII text, multilingual UTF-8 text, a short chunk of program data
//! with and without NUL bytes, and generators for bodies larger than the
//! request buffer.

/// Plain ASCII comment text.
pub const PLAIN_ASCII: &str = "\
I read the article on incremental request parsing with interest.\n\
The point about reserving a terminator byte was well made, although\n\
I would have liked a longer discussion of partial reads.\n\
-- A reader\n";

/// UTF-8 text using two and three byte sequences.
pub const UTF8_DEMO_A: &str = "\
Greek: \u{03a4}\u{03b7} \u{03b3}\u{03bb}\u{03ce}\u{03c3}\u{03c3}\u{03b1} \
\u{03bc}\u{03bf}\u{03c5} \u{03ad}\u{03b4}\u{03c9}\u{03c3}\u{03b1}\u{03bd}\n\
Russian: \u{041d}\u{0430} \u{0431}\u{0435}\u{0440}\u{0435}\u{0433}\u{0443} \
\u{043f}\u{0443}\u{0441}\u{0442}\u{044b}\u{043d}\u{043d}\u{044b}\u{0445} \
\u{0432}\u{043e}\u{043b}\u{043d}\n\
Japanese: \u{3044}\u{308d}\u{306f}\u{306b}\u{307b}\u{3078}\u{3068}\n\
Math: \u{2200}x \u{2208} \u{211d}, \u{2203}y: x \u{2264} y\n";

/// UTF-8 text including four byte sequences.
pub const UTF8_DEMO_B: &str = "\
Music: \u{1d11e} \u{1d122}\n\
Emoji: \u{1f600} \u{1f389} \u{1f680}\n\
Runes: \u{16a0}\u{16c7}\u{16bb}\u{16eb}\u{16d2}\u{16e6}\u{16a6}\n\
Accents: caf\u{e9}, na\u{ef}ve, \u{e5}ngstr\u{f6}m\n";

/// The start of an ELF executable: binary data containing NUL bytes.
pub fn short_program_data() -> Vec<u8> {
    let mut data = vec![
        0x7f, b'E', b'L', b'F', 0x02, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x03, 0x00, 0x3e, 0x00, 0x01, 0x00, 0x00, 0x00, 0x60, 0x10, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xb0, 0x3a,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];
    data.extend_from_slice(&[0xf3, 0x0f, 0x1e, 0xfa, 0x48, 0x83, 0xec, 0x08, 0x48, 0x8b]);
    data
}

/// Program data with every NUL byte replaced, so only the byte patterns
/// make it invalid.
pub fn short_program_data_without_nuls() -> Vec<u8> {
    short_program_data()
        .into_iter()
        .map(|b| if b == 0 { 0x90 } else { b })
        .collect()
}

/// `len` bytes of binary program data.
pub fn program_data(len: usize) -> Vec<u8> {
    let seed = short_program_data_without_nuls();
    seed.iter().copied().cycle().take(len).collect()
}

/// `len` bytes of ASCII text.
pub fn oversize_text(len: usize) -> Vec<u8> {
    b"all work and no play makes a very long comment\n"
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

/// Wraps `body` in a minimal `POST` request.
pub fn post(body: &[u8]) -> Vec<u8> {
    let mut request = request_head(body.len(), false);
    request.extend_from_slice(body);
    request
}

/// Request headers announcing a `body_len` byte body with
/// `Expect: 100-continue`.
pub fn continue_head(body_len: usize) -> Vec<u8> {
    request_head(body_len, true)
}

fn request_head(body_len: usize, expect_continue: bool) -> Vec<u8> {
    let mut head = format!(
        "POST /comment HTTP/1.1\r\n\
         Host: localhost\r\n\
         User-Agent: commentd-test\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         Content-Length: {body_len}\r\n"
    );
    if expect_continue {
        head.push_str("Expect: 100-continue\r\n");
    }
    head.push_str("\r\n");
    head.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_fixtures_are_utf8_without_nuls() {
        for text in [PLAIN_ASCII, UTF8_DEMO_A, UTF8_DEMO_B] {
            assert!(!text.as_bytes().contains(&0));
        }
        assert!(PLAIN_ASCII.is_ascii());
        assert!(UTF8_DEMO_B.chars().any(|c| c.len_utf8() == 4));
    }

    #[test]
    fn test_program_data_fixtures_are_not_utf8() {
        assert!(short_program_data().contains(&0));
        assert!(!short_program_data_without_nuls().contains(&0));
        assert!(std::str::from_utf8(&short_program_data_without_nuls()).is_err());
        assert_eq!(program_data(100).len(), 100);
    }

    #[test]
    fn test_post_sets_content_length() {
        let request = post(b"hello");
        let text = String::from_utf8(request).unwrap();
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(text.ends_with("\r\n\r\nhello"));
        assert!(!text.contains("Expect"));
    }

    #[test]
    fn test_continue_head() {
        let text = String::from_utf8(continue_head(12)).unwrap();
        assert!(text.contains("Expect: 100-continue\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }
}
