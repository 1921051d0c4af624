//! Target address parsing
//!
//! Supports formats:
//! * host:port (DNS name or IPv4 literal)
//! * [ipv6]:port

use crate::{Error, Result};
use std::net::Ipv6Addr;

/// Parsed `host:port` target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    host: String,
    port: u16,
}

impl Address {
    /// Build an address from its parts
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into();
        let display = format!("{}:{}", host, port);

        if host.is_empty() {
            return Err(invalid(&display, "empty host"));
        }
        if port == 0 {
            return Err(invalid(&display, "port must be between 1 and 65535"));
        }
        if host.contains(':') && host.parse::<Ipv6Addr>().is_err() {
            return Err(invalid(&display, "host contains ':'"));
        }

        Ok(Self { host, port })
    }

    /// Parse address string
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, rest) = rest
                .split_once(']')
                .ok_or_else(|| invalid(s, "unterminated '[' in IPv6 address"))?;
            if host.parse::<Ipv6Addr>().is_err() {
                return Err(invalid(s, "invalid IPv6 address"));
            }
            let port = rest
                .strip_prefix(':')
                .ok_or_else(|| invalid(s, "missing port"))?;
            (host, port)
        } else {
            let (host, port) = s.rsplit_once(':').ok_or_else(|| invalid(s, "missing port"))?;
            if host.contains(':') {
                return Err(invalid(s, "IPv6 addresses must be enclosed in brackets"));
            }
            (host, port)
        };

        if host.is_empty() {
            return Err(invalid(s, "empty host"));
        }
        if port.is_empty() {
            return Err(invalid(s, "missing port"));
        }

        let port: u16 = port
            .parse()
            .map_err(|_| invalid(s, &format!("invalid port '{}'", port)))?;
        if port == 0 {
            return Err(invalid(s, "port must be between 1 and 65535"));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Host part (brackets stripped for IPv6)
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port part
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn invalid(address: &str, reason: &str) -> Error {
    Error::Address {
        address: address.to_string(),
        reason: reason.to_string(),
    }
}
