//! Scripted POP3 session over TLS
//!
//! Logs in, asks for the mailbox status and quits, checking every reply for
//! `+OK`. The final line reports how many checks passed.
//!
//! ```bash
//! POP3_ADDR=pop.example.com:995 POP3_USER=alice POP3_PASS=secret \
//!     RUST_LOG=linewire=debug cargo run --example pop3_session
//! ```
//!
//! Set `POP3_PLAIN=true` to talk to a plaintext server (port 110).

use linewire::Connection;
use std::env;

struct Checks {
    passed: usize,
    total: usize,
}

impl Checks {
    fn verify(&mut self, command: &str, response: &str, expected: &str) {
        self.total += 1;
        if response.contains(expected) {
            self.passed += 1;
            println!("  ✓ verify {}", command);
        } else {
            println!("  ✗ verify {}: {}", command, response);
        }
    }
}

async fn send_then_verify(
    conn: &mut Connection,
    checks: &mut Checks,
    command: &str,
    payload: &str,
) -> linewire::Result<()> {
    let line = if payload.is_empty() {
        command.to_string()
    } else {
        format!("{} {}", command, payload)
    };

    conn.write_line(&line).await?;
    let response = conn.read_line().await?;
    checks.verify(command, &response, "+OK");
    Ok(())
}

async fn run(conn: &mut Connection, checks: &mut Checks) -> linewire::Result<()> {
    let user = env::var("POP3_USER").unwrap_or_else(|_| "user".to_string());
    let pass = env::var("POP3_PASS").unwrap_or_else(|_| "pass".to_string());

    let banner = conn.read_line().await?;
    checks.verify("banner", &banner, "+OK");

    send_then_verify(conn, checks, "USER", &user).await?;
    send_then_verify(conn, checks, "PASS", &pass).await?;
    send_then_verify(conn, checks, "STAT", "").await?;
    send_then_verify(conn, checks, "QUIT", "").await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("linewire=info".parse()?),
        )
        .init();

    let addr = env::args()
        .nth(1)
        .or_else(|| env::var("POP3_ADDR").ok())
        .unwrap_or_else(|| "localhost:995".to_string());
    let use_tls = !env::var("POP3_PLAIN")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    println!("POP3 session against {} (tls: {})", addr, use_tls);

    let mut conn = linewire::connect(use_tls, &addr, true).await?;
    let mut checks = Checks {
        passed: 0,
        total: 0,
    };

    let result = run(&mut conn, &mut checks).await;
    conn.close().await?;
    result?;

    println!("{}/{} checks passed", checks.passed, checks.total);
    Ok(())
}
