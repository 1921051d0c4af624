//! TLS configuration for encrypted line connections.
//!
//! Server certificates are validated against the system root store, falling
//! back to the bundled Mozilla roots when the system store is empty or
//! unreadable. A custom CA file can replace both.

use crate::{Error, Result};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pemfile::Item;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use std::fs;
use std::net::IpAddr;
use std::sync::{Arc, OnceLock};

/// TLS configuration for line connections.
///
/// # Examples
///
/// ```ignore
/// use linewire::connection::TlsConfig;
///
/// // System root certificates (production)
/// let tls = TlsConfig::builder().build()?;
///
/// // Custom CA certificate
/// let tls = TlsConfig::builder()
///     .ca_cert_path("/path/to/ca.pem")
///     .build()?;
///
/// // Self-signed test servers (danger: disables verification)
/// let tls = TlsConfig::builder()
///     .danger_accept_invalid_certs(true)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct TlsConfig {
    /// Path to CA certificate file (None = use system roots)
    ca_cert_path: Option<String>,
    /// Whether to accept any server certificate (testing only)
    danger_accept_invalid_certs: bool,
    /// Compiled rustls ClientConfig
    client_config: Arc<ClientConfig>,
}

impl TlsConfig {
    /// Create a new TLS configuration builder.
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder::default()
    }

    /// Standard validation against the system roots.
    ///
    /// The root store is loaded once per process and shared by every
    /// connection that does not supply its own configuration.
    pub fn system_default() -> TlsConfig {
        static SYSTEM_DEFAULT: OnceLock<TlsConfig> = OnceLock::new();

        SYSTEM_DEFAULT
            .get_or_init(|| TlsConfig {
                ca_cert_path: None,
                danger_accept_invalid_certs: false,
                client_config: Arc::new(verified_client_config(load_system_roots())),
            })
            .clone()
    }

    /// Get the rustls ClientConfig for this TLS configuration.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client_config.clone()
    }

    /// Path of the custom CA file, if any.
    pub fn ca_cert_path(&self) -> Option<&str> {
        self.ca_cert_path.as_deref()
    }

    /// Check if invalid certificates are accepted (testing only).
    pub fn danger_accept_invalid_certs(&self) -> bool {
        self.danger_accept_invalid_certs
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("ca_cert_path", &self.ca_cert_path)
            .field(
                "danger_accept_invalid_certs",
                &self.danger_accept_invalid_certs,
            )
            .field("client_config", &"<ClientConfig>")
            .finish()
    }
}

/// Builder for TLS configuration.
#[derive(Debug, Default)]
pub struct TlsConfigBuilder {
    ca_cert_path: Option<String>,
    danger_accept_invalid_certs: bool,
}

impl TlsConfigBuilder {
    /// Set the path to a custom CA certificate file (PEM format).
    ///
    /// If not set, system root certificates will be used.
    pub fn ca_cert_path(mut self, path: impl Into<String>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    /// ⚠️ **DANGER**: Accept any server certificate.
    ///
    /// **NEVER use in production.** Certificate chain and hostname checks are
    /// skipped entirely; handshake signatures are still verified. Meant for
    /// load tests against servers with self-signed certificates.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.danger_accept_invalid_certs = accept;
        self
    }

    /// Build the TLS configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the CA certificate file cannot be read or
    /// contains no certificate.
    pub fn build(self) -> Result<TlsConfig> {
        let client_config = if self.danger_accept_invalid_certs {
            tracing::warn!("TLS certificate verification disabled");
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate::new()))
                .with_no_client_auth()
        } else {
            match &self.ca_cert_path {
                Some(ca_path) => verified_client_config(load_custom_ca(ca_path)?),
                None => return Ok(TlsConfig::system_default()),
            }
        };

        Ok(TlsConfig {
            ca_cert_path: self.ca_cert_path,
            danger_accept_invalid_certs: self.danger_accept_invalid_certs,
            client_config: Arc::new(client_config),
        })
    }
}

fn verified_client_config(root_store: RootCertStore) -> ClientConfig {
    ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

/// System root certificates, or the bundled Mozilla roots if none load.
fn load_system_roots() -> RootCertStore {
    let result = rustls_native_certs::load_native_certs();

    let mut store = RootCertStore::empty();
    let (added, _ignored) = store.add_parsable_certificates(result.certs);

    if !result.errors.is_empty() {
        tracing::debug!(errors = result.errors.len(), "errors loading system roots");
    }

    if added == 0 {
        tracing::debug!("no system root certificates, using bundled roots");
        store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    store
}

/// Load a custom CA certificate from a PEM file.
fn load_custom_ca(ca_path: &str) -> Result<RootCertStore> {
    let ca_cert_data = fs::read(ca_path).map_err(|e| {
        Error::Config(format!(
            "Failed to read CA certificate file '{}': {}",
            ca_path, e
        ))
    })?;

    let mut reader = std::io::Cursor::new(&ca_cert_data);
    let mut root_store = RootCertStore::empty();
    let mut found_certs = 0;

    loop {
        match rustls_pemfile::read_one(&mut reader) {
            Ok(Some(Item::X509Certificate(cert))) => {
                let _ = root_store.add_parsable_certificates(std::iter::once(cert));
                found_certs += 1;
            }
            Ok(Some(_)) => {
                // Skip non-certificate items (private keys, etc.)
            }
            Ok(None) => break,
            Err(_) => {
                return Err(Error::Config(format!(
                    "Failed to parse CA certificate from '{}'",
                    ca_path
                )));
            }
        }
    }

    if found_certs == 0 {
        return Err(Error::Config(format!(
            "No valid certificates found in '{}'",
            ca_path
        )));
    }

    Ok(root_store)
}

/// Verifier that trusts every certificate but still checks handshake signatures.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl AcceptAnyCertificate {
    fn new() -> Self {
        let provider = CryptoProvider::get_default()
            .cloned()
            .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()));
        Self { provider }
    }
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Parse server name from host for TLS SNI (Server Name Indication).
///
/// IP addresses are accepted as-is (rustls matches them against IP SANs).
///
/// # Errors
///
/// Returns `Error::Config` if the hostname is invalid.
pub fn parse_server_name(host: &str) -> Result<ServerName<'static>> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ServerName::IpAddress(ip.into()));
    }

    // Remove trailing dot if present
    let hostname = host.trim_end_matches('.');

    if hostname.is_empty()
        || hostname.len() > 253
        || !hostname
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return Err(Error::Config(format!(
            "Invalid hostname for TLS: '{}'",
            host
        )));
    }

    ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Config(format!("Invalid hostname for TLS: '{}'", host)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_tls_config_builder_defaults() {
        let tls = TlsConfigBuilder::default();
        assert!(!tls.danger_accept_invalid_certs);
        assert!(tls.ca_cert_path.is_none());
    }

    #[test]
    fn test_tls_config_build_with_system_roots() {
        let tls = TlsConfig::builder()
            .build()
            .expect("Failed to build TLS config");

        assert!(!tls.danger_accept_invalid_certs());
        assert!(tls.ca_cert_path().is_none());
    }

    #[test]
    fn test_system_default_is_loaded_once() {
        let first = TlsConfig::system_default();
        let second = TlsConfig::builder().build().unwrap();

        assert!(Arc::ptr_eq(&first.client_config(), &second.client_config()));
        assert!(!second.danger_accept_invalid_certs());
    }

    #[test]
    fn test_accept_any_certificate_trusts_self_signed() {
        let cert = rcgen::generate_simple_self_signed(vec!["mail.test".into()]).unwrap();
        let cert_der = CertificateDer::from(cert.cert.der().to_vec());
        let server_name = ServerName::try_from("other.test".to_string()).unwrap();

        let verifier = AcceptAnyCertificate::new();
        let result = verifier.verify_server_cert(&cert_der, &[], &server_name, &[], UnixTime::now());

        assert!(result.is_ok());
        assert!(!verifier.supported_verify_schemes().is_empty());
    }

    #[test]
    fn test_tls_config_accept_invalid_certs() {
        let tls = TlsConfig::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .expect("Failed to build TLS config");

        assert!(tls.danger_accept_invalid_certs());
    }

    #[test]
    fn test_tls_config_missing_ca_file() {
        let result = TlsConfig::builder()
            .ca_cert_path("/nonexistent/linewire-ca.pem")
            .build();

        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("Failed to read CA certificate")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_tls_config_ca_file_without_certificates() {
        let path = std::env::temp_dir().join(format!("linewire-empty-ca-{}.pem", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "not a certificate").unwrap();
        drop(file);

        let result = TlsConfig::builder()
            .ca_cert_path(path.to_string_lossy())
            .build();
        let _ = fs::remove_file(&path);

        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("No valid certificates")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_server_name_valid() {
        assert!(parse_server_name("localhost").is_ok());
        assert!(parse_server_name("pop.example.com").is_ok());
        assert!(parse_server_name("mail-01.internal.example.com").is_ok());
    }

    #[test]
    fn test_parse_server_name_trailing_dot() {
        let name = parse_server_name("example.com.").unwrap();
        assert!(matches!(name, ServerName::DnsName(ref d) if d.as_ref() == "example.com"));
    }

    #[test]
    fn test_parse_server_name_ip() {
        assert!(matches!(
            parse_server_name("127.0.0.1").unwrap(),
            ServerName::IpAddress(_)
        ));
        assert!(matches!(
            parse_server_name("::1").unwrap(),
            ServerName::IpAddress(_)
        ));
    }

    #[test]
    fn test_parse_server_name_invalid() {
        assert!(parse_server_name("").is_err());
        assert!(parse_server_name("bad host").is_err());
        assert!(parse_server_name("example.com:995").is_err());
    }

    #[test]
    fn test_tls_config_debug() {
        let tls = TlsConfig::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .expect("Failed to build TLS config");

        let debug_str = format!("{:?}", tls);
        assert!(debug_str.contains("TlsConfig"));
        assert!(debug_str.contains("danger_accept_invalid_certs"));
    }
}
