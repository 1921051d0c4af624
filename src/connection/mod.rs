//! Connection management
//!
//! This module handles:
//! * Transport abstraction (plain TCP vs TLS over TCP)
//! * Connection lifecycle (connect, handshake, close)
//! * Buffered line reads and CRLF line writes
//! * TLS configuration and support

mod conn;
mod state;
mod tls;
mod transport;

pub use crate::protocol::LineMode;
pub use conn::{Connection, ConnectionConfig, ConnectionConfigBuilder};
pub use state::ConnectionState;
pub use tls::{parse_server_name, TlsConfig, TlsConfigBuilder};
pub use transport::Transport;
