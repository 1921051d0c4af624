//! Entry point for scripted conversations

mod address;

pub use address::Address;

use crate::connection::{Connection, ConnectionConfig};
use crate::Result;

/// Open a line connection to `address` (`host:port`).
///
/// * `use_tls` - perform a TLS handshake (standard certificate validation)
///   right after the TCP connect
/// * `enable_read_timeout` - bound every read by
///   [`DEFAULT_READ_TIMEOUT`](crate::protocol::constants::DEFAULT_READ_TIMEOUT);
///   when false, reads wait until data arrives or the peer closes
///
/// Use [`Connection::connect_with_config`] for custom timeouts, TLS settings
/// or strict CRLF framing.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> linewire::Result<()> {
/// let mut conn = linewire::connect(false, "localhost:110", true).await?;
/// let banner = conn.read_line().await?;
/// conn.close().await?;
/// # Ok(())
/// # }
/// ```
pub async fn connect(use_tls: bool, address: &str, enable_read_timeout: bool) -> Result<Connection> {
    let config = ConnectionConfig::new(use_tls, enable_read_timeout);
    Connection::connect_with_config(address, &config).await
}
