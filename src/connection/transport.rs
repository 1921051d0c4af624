//! Transport abstraction (plain TCP vs TLS over TCP)

use super::tls::{parse_server_name, TlsConfig};
use crate::client::Address;
use crate::{Error, Result};
use bytes::BytesMut;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Byte stream underneath a line connection
#[allow(clippy::large_enum_variant)]
pub enum Transport {
    /// Plain TCP connection
    Plain(TcpStream),
    /// TLS-encrypted TCP connection
    Tls(tokio_rustls::client::TlsStream<TcpStream>),
    /// Scripted stream for unit tests
    #[cfg(test)]
    Mock(tokio_test::io::Mock),
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Plain(_) => f.write_str("Transport::Plain(TcpStream)"),
            Transport::Tls(_) => f.write_str("Transport::Tls(TlsStream)"),
            #[cfg(test)]
            Transport::Mock(_) => f.write_str("Transport::Mock"),
        }
    }
}

impl Transport {
    /// Connect via plain TCP
    pub async fn connect_tcp(address: &Address) -> Result<Self> {
        let stream = TcpStream::connect((address.host(), address.port()))
            .await
            .map_err(|source| Error::Connect {
                address: address.to_string(),
                source,
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "failed to set TCP_NODELAY");
        }

        Ok(Transport::Plain(stream))
    }

    /// Connect via TCP, then perform the TLS handshake
    pub async fn connect_tls(address: &Address, tls_config: &TlsConfig) -> Result<Self> {
        Self::connect_tcp(address)
            .await?
            .upgrade_to_tls(tls_config, address.host())
            .await
    }

    /// Upgrade a plain TCP transport to TLS.
    ///
    /// Consumes `self` and returns a new `Transport` with a TLS-encrypted stream.
    /// Returns an error if the transport is not a plain TCP connection.
    pub async fn upgrade_to_tls(self, tls_config: &TlsConfig, hostname: &str) -> Result<Self> {
        match self {
            Transport::Plain(tcp_stream) => {
                let server_name = parse_server_name(hostname)?;

                let tls_connector = tokio_rustls::TlsConnector::from(tls_config.client_config());
                let tls_stream = tls_connector
                    .connect(server_name, tcp_stream)
                    .await
                    .map_err(Error::Tls)?;

                Ok(Transport::Tls(tls_stream))
            }
            Transport::Tls(_) => Err(Error::Config(
                "transport is already TLS-encrypted".into(),
            )),
            #[cfg(test)]
            Transport::Mock(_) => Err(Error::Config("cannot upgrade mock transport".into())),
        }
    }

    /// Whether the stream is TLS-encrypted
    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tls(_))
    }

    /// Remote address of the underlying socket
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        match self {
            Transport::Plain(stream) => stream.peer_addr().ok(),
            Transport::Tls(stream) => stream.get_ref().0.peer_addr().ok(),
            #[cfg(test)]
            Transport::Mock(_) => None,
        }
    }

    /// Write all bytes to the stream, looping over short writes
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let result = match self {
            Transport::Plain(stream) => stream.write_all(buf).await,
            Transport::Tls(stream) => stream.write_all(buf).await,
            #[cfg(test)]
            Transport::Mock(stream) => stream.write_all(buf).await,
        };
        result.map_err(Error::Write)
    }

    /// Flush the stream
    pub async fn flush(&mut self) -> Result<()> {
        let result = match self {
            Transport::Plain(stream) => stream.flush().await,
            Transport::Tls(stream) => stream.flush().await,
            #[cfg(test)]
            Transport::Mock(stream) => stream.flush().await,
        };
        result.map_err(Error::Write)
    }

    /// Read into buffer, returning the number of bytes appended (0 at EOF)
    pub async fn read_buf(&mut self, buf: &mut BytesMut) -> Result<usize> {
        let result = match self {
            Transport::Plain(stream) => stream.read_buf(buf).await,
            Transport::Tls(stream) => stream.read_buf(buf).await,
            #[cfg(test)]
            Transport::Mock(stream) => stream.read_buf(buf).await,
        };
        result.map_err(Error::Read)
    }

    /// Shutdown the stream (sends TLS close_notify when encrypted)
    pub async fn shutdown(&mut self) -> std::io::Result<()> {
        match self {
            Transport::Plain(stream) => stream.shutdown().await,
            Transport::Tls(stream) => stream.shutdown().await,
            #[cfg(test)]
            Transport::Mock(stream) => stream.shutdown().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_connect_refused() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let address = Address::new("127.0.0.1", port).unwrap();
        match Transport::connect_tcp(&address).await {
            Err(Error::Connect { address, .. }) => assert_eq!(address, format!("127.0.0.1:{}", port)),
            other => panic!("expected connect error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tcp_connect_and_peer_addr() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local = listener.local_addr().unwrap();

        let address = Address::new("127.0.0.1", local.port()).unwrap();
        let transport = Transport::connect_tcp(&address).await.unwrap();

        assert!(!transport.is_tls());
        assert_eq!(transport.peer_addr(), Some(local));
    }

    #[tokio::test]
    async fn test_upgrade_mock_rejected() {
        let tls = TlsConfig::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .unwrap();
        let mock = tokio_test::io::Builder::new().build();

        let result = Transport::Mock(mock).upgrade_to_tls(&tls, "localhost").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
