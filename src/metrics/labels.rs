//! Label keys and values

/// Label key: transport kind
pub const TRANSPORT: &str = "transport";

/// Label key: error category (see [`crate::Error::category`])
pub const ERROR_CATEGORY: &str = "category";

/// Label key: operation that failed
pub const OPERATION: &str = "operation";

/// Transport value: plain TCP
pub const TRANSPORT_TCP: &str = "tcp";

/// Transport value: TLS over TCP
pub const TRANSPORT_TLS: &str = "tls";

/// Operation value: connection establishment
pub const OP_CONNECT: &str = "connect";

/// Operation value: line or raw read
pub const OP_READ: &str = "read";

/// Operation value: line or raw write
pub const OP_WRITE: &str = "write";

/// Transport label value for a TLS flag
pub fn transport(tls: bool) -> &'static str {
    if tls {
        TRANSPORT_TLS
    } else {
        TRANSPORT_TCP
    }
}
