//! Integration tests for TLS encryption
//!
//! These tests need a real TLS line server, for example a POP3S mailbox:
//!
//! ```bash
//! export TLS_TEST_ADDR="pop.example.com:995"
//! export TLS_TEST_INSECURE="true"  # Allow self-signed for dev/test
//!
//! cargo test --test tls_integration -- --ignored --nocapture
//! ```

#[cfg(test)]
mod tls_integration {
    use linewire::connection::{ConnectionConfig, TlsConfig};
    use linewire::{Connection, Error};
    use std::env;
    use std::time::Duration;

    /// Helper to get TLS test configuration from environment
    fn get_tls_test_config() -> Option<(String, bool)> {
        let addr = env::var("TLS_TEST_ADDR").ok()?;
        let insecure = env::var("TLS_TEST_INSECURE")
            .ok()
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);
        Some((addr, insecure))
    }

    fn connection_config(insecure: bool) -> ConnectionConfig {
        let tls = TlsConfig::builder()
            .danger_accept_invalid_certs(insecure)
            .build()
            .expect("Failed to build TLS config");

        ConnectionConfig::builder()
            .tls_config(tls)
            .read_timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(10))
            .build()
    }

    /// Banner is readable over TLS
    #[tokio::test]
    #[ignore] // Requires a TLS line server
    async fn test_tls_banner() {
        let (addr, insecure) = match get_tls_test_config() {
            Some(cfg) => cfg,
            None => {
                eprintln!("Skipping test: TLS_TEST_ADDR not set");
                return;
            }
        };

        let mut conn = Connection::connect_with_config(&addr, &connection_config(insecure))
            .await
            .expect("Failed to connect with TLS");
        assert!(conn.is_tls());

        let banner = conn.read_line().await.expect("Failed to read banner");
        println!("✓ TLS banner: {}", banner);

        conn.close().await.expect("close");
    }

    /// POP3 greeting, CAPA-less QUIT over TLS
    #[tokio::test]
    #[ignore] // Requires a POP3S server
    async fn test_tls_pop3_quit() {
        let (addr, insecure) = match get_tls_test_config() {
            Some(cfg) => cfg,
            None => {
                eprintln!("Skipping test: TLS_TEST_ADDR not set");
                return;
            }
        };

        let mut conn = Connection::connect_with_config(&addr, &connection_config(insecure))
            .await
            .expect("Failed to connect with TLS");

        let banner = conn.read_line().await.expect("banner");
        assert!(banner.starts_with("+OK"), "unexpected banner: {}", banner);

        conn.write_line("QUIT").await.expect("write QUIT");
        let bye = conn.read_line().await.expect("read QUIT reply");
        assert!(bye.starts_with("+OK"), "unexpected reply: {}", bye);

        conn.close().await.expect("close");
        println!("✓ POP3 over TLS succeeded");
    }

    /// Standard validation rejects self-signed certificates
    #[tokio::test]
    #[ignore] // Requires a TLS server with a self-signed certificate
    async fn test_tls_rejects_untrusted_certificate() {
        let (addr, insecure) = match get_tls_test_config() {
            Some(cfg) => cfg,
            None => {
                eprintln!("Skipping test: TLS_TEST_ADDR not set");
                return;
            }
        };
        if !insecure {
            eprintln!("Skipping test: server certificate is trusted");
            return;
        }

        let result = linewire::connect(true, &addr, true).await;
        assert!(
            matches!(result, Err(Error::Tls(_))),
            "expected TLS error, got {:?}",
            result
        );
    }

    /// Loopback POP3S stub with a freshly generated self-signed certificate
    ///
    /// Answers the banner and every line with `+OK`, closing after `QUIT`.
    async fn spawn_self_signed_server() -> u16 {
        use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
        use std::sync::Arc;
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

        let cert = rcgen::generate_simple_self_signed(vec!["localhost".into()])
            .expect("failed to generate cert");
        let cert_der = CertificateDer::from(cert.cert.der().to_vec());
        let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der()));

        let server_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der], key_der)
            .expect("server config");
        let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(server_config));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    // Rejected handshakes end here
                    let Ok(stream) = acceptor.accept(socket).await else {
                        return;
                    };
                    let (reader, mut writer) = tokio::io::split(stream);
                    if writer.write_all(b"+OK POP3 ready\r\n").await.is_err() {
                        return;
                    }
                    let mut lines = BufReader::new(reader).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        let reply = format!("+OK {}\r\n", line);
                        if writer.write_all(reply.as_bytes()).await.is_err() || line == "QUIT" {
                            break;
                        }
                    }
                    let _ = writer.shutdown().await;
                });
            }
        });

        port
    }

    /// Self-signed certificate is accepted when verification is disabled
    #[tokio::test]
    async fn test_tls_self_signed_conversation() {
        let port = spawn_self_signed_server().await;

        let mut conn =
            Connection::connect_with_config(&format!("localhost:{}", port), &connection_config(true))
                .await
                .expect("Failed to connect with TLS");
        assert!(conn.is_tls());

        assert_eq!(conn.read_line().await.unwrap(), "+OK POP3 ready");
        conn.write_line("USER alice").await.unwrap();
        assert_eq!(conn.read_line().await.unwrap(), "+OK USER alice");
        conn.write_line("QUIT").await.unwrap();
        assert_eq!(conn.read_line().await.unwrap(), "+OK QUIT");

        conn.close().await.expect("close");
        conn.close().await.expect("second close");
    }

    /// Standard validation rejects the same self-signed certificate
    #[tokio::test]
    async fn test_tls_self_signed_rejected_by_default() {
        let port = spawn_self_signed_server().await;

        let result = linewire::connect(true, &format!("localhost:{}", port), true).await;
        match result {
            Err(Error::Tls(e)) => println!("✓ rejected: {}", e),
            other => panic!("expected TLS error, got {:?}", other),
        }
    }

    /// TLS config with invalid CA path fails before dialing
    #[tokio::test]
    async fn test_tls_invalid_ca_path() {
        let result = TlsConfig::builder()
            .ca_cert_path("/nonexistent/ca.pem")
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    /// Peer that hangs up during the handshake surfaces as a TLS error
    #[tokio::test]
    async fn test_tls_peer_closes_during_handshake() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        let result = Connection::connect_with_config(&addr.to_string(), &connection_config(true)).await;
        assert!(
            matches!(result, Err(Error::Tls(_))),
            "expected TLS error, got {:?}",
            result
        );
    }
}
