//! Line encoding

use super::constants::CRLF;
use bytes::{BufMut, BytesMut};

/// Encode a line: the text bytes followed by CRLF
///
/// The text is written as-is. Embedded CR or LF bytes are not escaped, the
/// caller owns the content of every line.
pub fn encode_line(text: &str) -> BytesMut {
    let mut buf = BytesMut::with_capacity(text.len() + CRLF.len());
    buf.put(text.as_bytes());
    buf.put(CRLF);
    buf
}
