//! Core connection type

use super::state::ConnectionState;
use super::tls::TlsConfig;
use super::transport::Transport;
use crate::client::Address;
use crate::metrics::labels;
use crate::protocol::constants::{
    CR, DEFAULT_MAX_LINE_LENGTH, DEFAULT_READ_TIMEOUT, READ_BUFFER_CAPACITY, READ_CHUNK_SIZE,
    SHUTDOWN_TIMEOUT,
};
use crate::protocol::{encode_line, find_line, LineBounds, LineMode};
use crate::{Error, Result};
use bytes::{Buf, Bytes, BytesMut};
use futures::Stream;
use serde::Deserialize;
use std::future::Future;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Connection configuration
///
/// `ConnectionConfig::new` covers the common case (TLS flag plus read timeout
/// flag). Use `ConnectionConfig::builder()` for custom timeouts, a custom TLS
/// configuration or strict CRLF framing.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Perform a TLS handshake after the TCP connect
    pub tls: bool,
    /// TLS settings (None = system roots with standard validation)
    pub tls_config: Option<TlsConfig>,
    /// Bound on each read operation (None = wait indefinitely)
    pub read_timeout: Option<Duration>,
    /// Bound on each write operation (None = wait indefinitely)
    pub write_timeout: Option<Duration>,
    /// Bound on TCP connect plus TLS handshake (None = OS default)
    pub connect_timeout: Option<Duration>,
    /// Line terminators accepted by `read_line`
    pub line_mode: LineMode,
    /// Largest line accepted before its delimiter arrives
    pub max_line_length: usize,
}

impl ConnectionConfig {
    /// Create new configuration with defaults
    ///
    /// # Arguments
    ///
    /// * `tls` - Whether to wrap the connection in TLS
    /// * `enable_read_timeout` - Bound reads by [`DEFAULT_READ_TIMEOUT`]
    pub fn new(tls: bool, enable_read_timeout: bool) -> Self {
        Self {
            tls,
            tls_config: None,
            read_timeout: enable_read_timeout.then_some(DEFAULT_READ_TIMEOUT),
            write_timeout: None,
            connect_timeout: None,
            line_mode: LineMode::default(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }

    /// Create a builder for advanced configuration
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = ConnectionConfig::builder()
    ///     .tls(true)
    ///     .read_timeout(Duration::from_secs(5))
    ///     .connect_timeout(Duration::from_secs(3))
    ///     .line_mode(LineMode::Strict)
    ///     .build();
    /// ```
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder {
            config: Self::new(false, false),
        }
    }

    /// Load configuration from a JSON document.
    ///
    /// Every field is optional:
    ///
    /// ```json
    /// {
    ///   "tls": true,
    ///   "insecure_skip_verify": false,
    ///   "ca_cert_path": "/etc/ssl/test-ca.pem",
    ///   "enable_read_timeout": true,
    ///   "read_timeout_ms": 5000,
    ///   "write_timeout_ms": 5000,
    ///   "connect_timeout_ms": 3000,
    ///   "line_mode": "strict",
    ///   "max_line_length": 65536
    /// }
    /// ```
    ///
    /// `read_timeout_ms` wins over `enable_read_timeout`.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid connection config: {}", e)))?;
        raw.into_config()
    }
}

/// Wire shape of [`ConnectionConfig::from_json`]
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    tls: bool,
    insecure_skip_verify: bool,
    ca_cert_path: Option<String>,
    enable_read_timeout: bool,
    read_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    line_mode: LineMode,
    max_line_length: Option<usize>,
}

impl RawConfig {
    fn into_config(self) -> Result<ConnectionConfig> {
        let mut builder = ConnectionConfig::builder().line_mode(self.line_mode);

        if self.tls {
            let mut tls = TlsConfig::builder().danger_accept_invalid_certs(self.insecure_skip_verify);
            if let Some(path) = self.ca_cert_path {
                tls = tls.ca_cert_path(path);
            }
            builder = builder.tls_config(tls.build()?);
        } else if self.insecure_skip_verify || self.ca_cert_path.is_some() {
            return Err(Error::Config(
                "TLS options require \"tls\": true".into(),
            ));
        }

        match self.read_timeout_ms {
            Some(ms) => builder = builder.read_timeout(Duration::from_millis(ms)),
            None if self.enable_read_timeout => builder = builder.read_timeout(DEFAULT_READ_TIMEOUT),
            None => {}
        }
        if let Some(ms) = self.write_timeout_ms {
            builder = builder.write_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.connect_timeout_ms {
            builder = builder.connect_timeout(Duration::from_millis(ms));
        }
        if let Some(len) = self.max_line_length {
            if len == 0 {
                return Err(Error::Config("max_line_length must be positive".into()));
            }
            builder = builder.max_line_length(len);
        }

        Ok(builder.build())
    }
}

/// Builder for creating `ConnectionConfig` with advanced options
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Enable or disable TLS (default: disabled)
    pub fn tls(mut self, enabled: bool) -> Self {
        self.config.tls = enabled;
        self
    }

    /// Use a custom TLS configuration (implies `tls(true)`)
    pub fn tls_config(mut self, tls_config: TlsConfig) -> Self {
        self.config.tls = true;
        self.config.tls_config = Some(tls_config);
        self
    }

    /// Set read timeout
    ///
    /// Default: None (reads block until data or EOF)
    pub fn read_timeout(mut self, duration: Duration) -> Self {
        self.config.read_timeout = Some(duration);
        self
    }

    /// Set write timeout
    ///
    /// Default: None
    pub fn write_timeout(mut self, duration: Duration) -> Self {
        self.config.write_timeout = Some(duration);
        self
    }

    /// Set connect timeout (TCP connect plus TLS handshake)
    ///
    /// Default: None (OS default)
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.config.connect_timeout = Some(duration);
        self
    }

    /// Set line framing mode
    ///
    /// Default: [`LineMode::Lenient`]
    pub fn line_mode(mut self, mode: LineMode) -> Self {
        self.config.line_mode = mode;
        self
    }

    /// Set the maximum line length
    ///
    /// Default: [`DEFAULT_MAX_LINE_LENGTH`]
    pub fn max_line_length(mut self, len: usize) -> Self {
        self.config.max_line_length = len;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}

/// Line-oriented connection over TCP or TLS
///
/// All I/O methods take `&mut self`, so a connection is driven by one task at a
/// time. Independent connections share nothing and can run on separate tasks.
///
/// Errors never close the connection. Call [`Connection::close`] on every
/// path, including error paths; dropping the connection also releases the socket.
pub struct Connection {
    transport: Option<Transport>,
    state: ConnectionState,
    read_buf: BytesMut,
    /// Bytes of `read_buf` already known to hold no delimiter for `scan_mode`
    scan_offset: usize,
    scan_mode: LineMode,
    tls: bool,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    line_mode: LineMode,
    max_line_length: usize,
}

impl Connection {
    /// Create connection from an established transport
    pub fn new(transport: Transport, config: &ConnectionConfig) -> Self {
        Self {
            tls: transport.is_tls(),
            transport: Some(transport),
            state: ConnectionState::Open,
            read_buf: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            scan_offset: 0,
            scan_mode: config.line_mode,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            line_mode: config.line_mode,
            max_line_length: config.max_line_length,
        }
    }

    /// Connect with the TLS and read-timeout flags only
    ///
    /// See [`crate::connect`].
    pub async fn connect(use_tls: bool, address: &str, enable_read_timeout: bool) -> Result<Self> {
        crate::connect(use_tls, address, enable_read_timeout).await
    }

    /// Connect to `address` (`host:port`) with custom configuration
    ///
    /// # Errors
    ///
    /// * `Error::Address` - malformed address
    /// * `Error::Connect` - refused, unreachable, or name resolution failed
    /// * `Error::Tls` - TLS handshake failed
    /// * `Error::Config` - unusable TLS configuration or server name
    /// * `Error::Timeout` - `connect_timeout` elapsed
    pub async fn connect_with_config(address: &str, config: &ConnectionConfig) -> Result<Self> {
        let address = Address::parse(address)?;
        let tls_config = match (&config.tls_config, config.tls) {
            (_, false) => None,
            (Some(tls_config), true) => Some(tls_config.clone()),
            (None, true) => Some(TlsConfig::system_default()),
        };

        async {
            let start = Instant::now();

            let establish = async {
                match &tls_config {
                    Some(tls_config) => Transport::connect_tls(&address, tls_config).await,
                    None => Transport::connect_tcp(&address).await,
                }
            };

            match bounded("connect", config.connect_timeout, establish).await {
                Ok(transport) => {
                    crate::metrics::counters::connection_opened(config.tls);
                    crate::metrics::histograms::connect_duration(
                        config.tls,
                        start.elapsed().as_millis() as u64,
                    );
                    tracing::info!(peer = ?transport.peer_addr(), "connection established");
                    Ok(Self::new(transport, config))
                }
                Err(e) => {
                    crate::metrics::counters::operation_failed(labels::OP_CONNECT, e.category());
                    tracing::warn!(error = %e, "connection failed");
                    Err(e)
                }
            }
        }
        .instrument(tracing::info_span!(
            "connect",
            address = %address,
            tls = config.tls
        ))
        .await
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the stream is TLS-encrypted
    pub fn is_tls(&self) -> bool {
        self.tls
    }

    /// Configured read bound (None = reads wait indefinitely)
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Configured write bound
    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout
    }

    /// Line framing mode used by [`Connection::read_line`]
    pub fn line_mode(&self) -> LineMode {
        self.line_mode
    }

    /// Remote address (None once closed)
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.transport.as_ref().and_then(Transport::peer_addr)
    }

    /// Bytes received but not yet returned to the caller
    pub fn buffered_len(&self) -> usize {
        self.read_buf.len()
    }

    /// Write `text` followed by CRLF
    ///
    /// All bytes are sent and flushed before returning. No retry on failure.
    pub async fn write_line(&mut self, text: &str) -> Result<()> {
        let buf = encode_line(text);
        self.send(&buf).await?;
        crate::metrics::counters::line_written();
        tracing::trace!(bytes = buf.len(), "line sent");
        Ok(())
    }

    /// Write raw bytes (no terminator appended)
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.send(data).await
    }

    /// Read the next line using the configured [`LineMode`]
    ///
    /// The delimiter is stripped. A complete line already buffered is returned
    /// without touching the network.
    ///
    /// # Errors
    ///
    /// * `Error::Timeout` - read bound elapsed; received bytes stay buffered
    /// * `Error::Eof` - peer closed before a complete line
    /// * `Error::Read` - socket error, or the connection is closed
    /// * `Error::LineTooLong` - no delimiter within the maximum line length
    /// * `Error::InvalidUtf8` - the line stays buffered, use
    ///   [`Connection::read_line_bytes`] to consume it
    pub async fn read_line(&mut self) -> Result<String> {
        self.read_text_line(self.line_mode).await
    }

    /// Read the next line, accepting only CRLF as the terminator
    ///
    /// A bare LF is returned as part of the line content.
    pub async fn read_crlf_line(&mut self) -> Result<String> {
        self.read_text_line(LineMode::Strict).await
    }

    /// Read the next line as raw bytes using the configured [`LineMode`]
    pub async fn read_line_bytes(&mut self) -> Result<Bytes> {
        let start = Instant::now();
        let bounds = self.next_line(self.line_mode).await?;
        let mut line = self.read_buf.split_to(bounds.consumed);
        line.truncate(bounds.content_len);
        self.scan_offset = 0;
        record_line(&bounds, start);
        Ok(line.freeze())
    }

    /// Read raw bytes into `buf`, returning how many were read
    ///
    /// Buffered bytes left over from line reads are returned first. Returns
    /// `Ok(0)` once the peer has closed and nothing is buffered.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.transport.is_none() {
            return Err(Error::Read(Error::closed()));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        if self.read_buf.is_empty() {
            let n = bounded("read", self.read_timeout, self.receive())
                .await
                .map_err(|e| {
                    crate::metrics::counters::operation_failed(labels::OP_READ, e.category());
                    tracing::debug!(error = %e, "raw read failed");
                    e
                })?;
            if n == 0 {
                return Ok(0);
            }
        }

        let n = buf.len().min(self.read_buf.len());
        buf[..n].copy_from_slice(&self.read_buf[..n]);
        self.read_buf.advance(n);
        self.scan_offset = 0;
        Ok(n)
    }

    /// Consume the connection into a stream of lines
    ///
    /// The stream ends cleanly when the peer closes at a line boundary. Any
    /// other error is yielded once, then the stream ends and the socket is
    /// released.
    pub fn into_lines(self) -> impl Stream<Item = Result<String>> + Send {
        futures::stream::unfold(Some(self), |conn| async move {
            let mut conn = conn?;
            match conn.read_line().await {
                Ok(line) => Some((Ok(line), Some(conn))),
                Err(Error::Eof { pending: 0 }) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// Close the connection
    ///
    /// Shuts the stream down, releases the socket and discards buffered bytes.
    /// Closing an already closed connection is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if !self.state.transition(ConnectionState::Closed) {
            return Ok(());
        }

        self.read_buf = BytesMut::new();
        self.scan_offset = 0;

        if let Some(mut transport) = self.transport.take() {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, transport.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(error = %e, "shutdown failed"),
                Err(_) => tracing::debug!("shutdown timed out"),
            }
        }

        crate::metrics::counters::connection_closed(self.tls);
        tracing::info!("connection closed");
        Ok(())
    }

    async fn read_text_line(&mut self, mode: LineMode) -> Result<String> {
        let start = Instant::now();
        let bounds = self.next_line(mode).await?;
        let line = match std::str::from_utf8(&self.read_buf[..bounds.content_len]) {
            Ok(text) => text.to_owned(),
            Err(e) => {
                let err = Error::from(e);
                crate::metrics::counters::operation_failed(labels::OP_READ, err.category());
                tracing::debug!(error = %err, "line left buffered");
                return Err(err);
            }
        };
        self.read_buf.advance(bounds.consumed);
        self.scan_offset = 0;
        record_line(&bounds, start);
        Ok(line)
    }

    /// Locate the next complete line, reading from the network as needed
    async fn next_line(&mut self, mode: LineMode) -> Result<LineBounds> {
        let result = bounded("read", self.read_timeout, self.fill_line(mode)).await;

        if let Err(e) = &result {
            crate::metrics::counters::operation_failed(labels::OP_READ, e.category());
            tracing::debug!(error = %e, buffered = self.read_buf.len(), "read failed");
        }

        result
    }

    async fn fill_line(&mut self, mode: LineMode) -> Result<LineBounds> {
        loop {
            let from = if self.scan_mode == mode {
                self.scan_offset
            } else {
                0
            };
            if let Some(bounds) = find_line(&self.read_buf, mode, from) {
                return Ok(bounds);
            }
            self.scan_offset = mode.resume_offset(self.read_buf.len());
            self.scan_mode = mode;

            // A trailing CR may still turn out to be part of the delimiter
            let pending = match self.read_buf.last() {
                Some(&CR) => self.read_buf.len() - 1,
                _ => self.read_buf.len(),
            };
            if pending > self.max_line_length {
                return Err(Error::LineTooLong {
                    limit: self.max_line_length,
                });
            }

            if self.receive().await? == 0 {
                return Err(Error::Eof {
                    pending: self.read_buf.len(),
                });
            }
        }
    }

    /// Append one network read to the buffer, returning its size (0 at EOF)
    async fn receive(&mut self) -> Result<usize> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| Error::Read(Error::closed()))?;

        self.read_buf.reserve(READ_CHUNK_SIZE);
        let n = transport.read_buf(&mut self.read_buf).await?;
        crate::metrics::counters::bytes_read(n);
        Ok(n)
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| Error::Write(Error::closed()))?;

        let result = bounded("write", self.write_timeout, async {
            transport.write_all(data).await?;
            transport.flush().await
        })
        .await;

        match &result {
            Ok(()) => crate::metrics::counters::bytes_written(data.len()),
            Err(e) => {
                crate::metrics::counters::operation_failed(labels::OP_WRITE, e.category());
                tracing::debug!(error = %e, "write failed");
            }
        }

        result
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("transport", &self.transport)
            .field("state", &self.state)
            .field("buffered", &self.read_buf.len())
            .field("read_timeout", &self.read_timeout)
            .field("line_mode", &self.line_mode)
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.state.is_open() {
            tracing::debug!("connection dropped without close");
        }
    }
}

/// Count a line handed to the caller
fn record_line(bounds: &LineBounds, start: Instant) {
    crate::metrics::counters::line_read();
    crate::metrics::histograms::line_length(bounds.content_len);
    crate::metrics::histograms::read_line_duration(start.elapsed().as_millis() as u64);
}

/// Run `fut`, failing with `Error::Timeout` if `limit` elapses first
async fn bounded<T>(
    operation: &'static str,
    limit: Option<Duration>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match limit {
        Some(duration) => tokio::time::timeout(duration, fut)
            .await
            .unwrap_or_else(|_| Err(Error::Timeout { operation, duration })),
        None => fut.await,
    }
}
