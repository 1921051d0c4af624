//! Histogram metrics

use super::labels;
use metrics::histogram;

/// Time to establish a connection, handshake included (milliseconds)
pub fn connect_duration(tls: bool, millis: u64) {
    histogram!("linewire_connect_duration_ms", labels::TRANSPORT => labels::transport(tls))
        .record(millis as f64);
}

/// Time spent waiting for a complete line (milliseconds)
pub fn read_line_duration(millis: u64) {
    histogram!("linewire_read_line_duration_ms").record(millis as f64);
}

/// Length of each line returned, delimiter excluded (bytes)
pub fn line_length(len: usize) {
    histogram!("linewire_line_length_bytes").record(len as f64);
}
