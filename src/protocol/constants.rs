//! Line framing constants

use std::time::Duration;

/// Carriage return
pub const CR: u8 = b'\r';

/// Line feed
pub const LF: u8 = b'\n';

/// Line terminator appended to every written line
pub const CRLF: &[u8] = b"\r\n";

/// Read bound applied when the read timeout is enabled without an explicit value
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest line accepted before the delimiter is found (1 MiB)
///
/// Protects the read buffer from a peer that never sends a delimiter.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Initial capacity of the per-connection read buffer
pub const READ_BUFFER_CAPACITY: usize = 8192;

/// Minimum spare capacity reserved before each network read
pub const READ_CHUNK_SIZE: usize = 4096;

/// Bound on the graceful shutdown performed by `close`
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
