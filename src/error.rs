//! Error types

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while establishing or using a line connection
#[derive(Debug, Error)]
pub enum Error {
    /// Target address is malformed
    #[error("invalid address '{address}': {reason}")]
    Address {
        /// Address as supplied by the caller
        address: String,
        /// What is wrong with it
        reason: String,
    },

    /// TCP connect failed (refused, unreachable, resolution failure)
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// Address that was dialed
        address: String,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// TLS handshake failed
    #[error("TLS handshake failed: {0}")]
    Tls(#[source] io::Error),

    /// TLS or connection configuration is unusable
    #[error("configuration error: {0}")]
    Config(String),

    /// Sending bytes failed, or the connection is closed
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// Receiving bytes failed, or the connection is closed
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    /// Operation exceeded its configured bound
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// Operation that timed out (`connect`, `read`, `write`)
        operation: &'static str,
        /// Configured bound
        duration: Duration,
    },

    /// Peer closed the connection before a complete line was available
    #[error("connection closed by peer ({pending} unterminated bytes pending)")]
    Eof {
        /// Bytes received after the last delimiter
        pending: usize,
    },

    /// No delimiter found within the maximum line length
    #[error("line exceeds maximum length of {limit} bytes")]
    LineTooLong {
        /// Configured maximum line length
        limit: usize,
    },

    /// Line content is not valid UTF-8
    #[error("line is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

impl Error {
    /// Stable, low-cardinality name of the error kind (used as a metrics label)
    pub fn category(&self) -> &'static str {
        match self {
            Error::Address { .. } => "address",
            Error::Connect { .. } => "connect",
            Error::Tls(_) => "tls",
            Error::Config(_) => "config",
            Error::Write(_) => "write",
            Error::Read(_) => "read",
            Error::Timeout { .. } => "timeout",
            Error::Eof { .. } => "eof",
            Error::LineTooLong { .. } => "line_too_long",
            Error::InvalidUtf8(_) => "invalid_utf8",
        }
    }

    /// Whether the operation was rejected because the connection was already closed
    pub fn is_connection_closed(&self) -> bool {
        match self {
            Error::Write(e) | Error::Read(e) => e.kind() == io::ErrorKind::NotConnected,
            _ => false,
        }
    }

    /// Whether the error was caused by a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    pub(crate) fn closed() -> io::Error {
        io::Error::new(io::ErrorKind::NotConnected, "connection closed")
    }
}
