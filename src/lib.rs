//! linewire: line-oriented conversations over TCP and TLS
//!
//! linewire drives CRLF-delimited text protocols (POP3, SMTP, IMAP and friends)
//! from test scripts and load generators. It opens a TCP connection, optionally
//! wrapped in TLS, writes command lines and reads response lines back with exact
//! framing across partial network reads.
//!
//! The crate does not interpret the application protocol. Callers supply the
//! commands and check the replies themselves.
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> linewire::Result<()> {
//! let mut conn = linewire::connect(true, "pop.example.com:995", true).await?;
//!
//! let banner = conn.read_line().await?;
//! assert!(banner.starts_with("+OK"));
//!
//! conn.write_line("QUIT").await?;
//! let _bye = conn.read_line().await?;
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod protocol;

pub use client::{connect, Address};
pub use connection::{Connection, ConnectionConfig, ConnectionState, LineMode, TlsConfig};
pub use error::{Error, Result};
