//! Line decoding
//!
//! Lines are located in place inside the receive buffer. The caller keeps a
//! scan offset between network reads so bytes already inspected are never
//! scanned twice, and splits the line off only once a delimiter is found.

use super::constants::{CR, CRLF, LF};
use crate::Error;
use serde::Deserialize;

/// Which byte sequences terminate a line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineMode {
    /// CRLF or a bare LF (tolerates peers that omit the CR)
    #[default]
    Lenient,
    /// CRLF only; a bare LF is part of the line content
    Strict,
}

impl LineMode {
    /// Offset from which the next scan must resume once `len` bytes were
    /// inspected without finding a delimiter.
    ///
    /// In strict mode a trailing CR may be the first half of a delimiter whose
    /// LF has not arrived yet, so it is scanned again.
    pub fn resume_offset(&self, len: usize) -> usize {
        match self {
            Self::Lenient => len,
            Self::Strict => len.saturating_sub(1),
        }
    }
}

impl std::fmt::Display for LineMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lenient => write!(f, "lenient"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

impl std::str::FromStr for LineMode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            _ => Err(Error::Config(format!(
                "invalid line mode '{}': expected lenient or strict",
                s
            ))),
        }
    }
}

/// Position of a complete line inside a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineBounds {
    /// Length of the line content, delimiter excluded
    pub content_len: usize,
    /// Bytes to consume from the buffer, delimiter included
    pub consumed: usize,
}

/// Find the first complete line in `buf`, scanning from `from`.
///
/// Bytes before `from` must already be known to contain no delimiter (see
/// [`LineMode::resume_offset`]). Returns `None` when more data is needed.
pub fn find_line(buf: &[u8], mode: LineMode, from: usize) -> Option<LineBounds> {
    if from >= buf.len() {
        return None;
    }

    match mode {
        LineMode::Lenient => {
            let lf = from + buf[from..].iter().position(|&b| b == LF)?;
            let content_len = if lf > 0 && buf[lf - 1] == CR { lf - 1 } else { lf };
            Some(LineBounds {
                content_len,
                consumed: lf + 1,
            })
        }
        LineMode::Strict => {
            let cr = from + buf[from..].windows(CRLF.len()).position(|w| w == CRLF)?;
            Some(LineBounds {
                content_len: cr,
                consumed: cr + CRLF.len(),
            })
        }
    }
}
