//! Counter metrics

use super::labels;
use metrics::counter;

/// A connection was established (after the TLS handshake, when requested)
pub fn connection_opened(tls: bool) {
    counter!("linewire_connections_opened_total", labels::TRANSPORT => labels::transport(tls))
        .increment(1);
}

/// A connection was closed by the caller
pub fn connection_closed(tls: bool) {
    counter!("linewire_connections_closed_total", labels::TRANSPORT => labels::transport(tls))
        .increment(1);
}

/// An operation failed
pub fn operation_failed(operation: &'static str, category: &'static str) {
    counter!(
        "linewire_errors_total",
        labels::OPERATION => operation,
        labels::ERROR_CATEGORY => category
    )
    .increment(1);
}

/// A complete line was returned to the caller
pub fn line_read() {
    counter!("linewire_lines_read_total").increment(1);
}

/// A line was written in full
pub fn line_written() {
    counter!("linewire_lines_written_total").increment(1);
}

/// Bytes received from the peer
pub fn bytes_read(n: usize) {
    counter!("linewire_bytes_read_total").increment(n as u64);
}

/// Bytes sent to the peer
pub fn bytes_written(n: usize) {
    counter!("linewire_bytes_written_total").increment(n as u64);
}
