use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    #[error("invalid CA certificate: {reason}")]
    InvalidCertificate { reason: String },

    #[error("TLS configuration failed: {0}")]
    Tls(#[from] rustls::Error),

    #[error("server certificate rejected: {0}")]
    Rejected(rustls::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cannot connect to {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    #[error("'{address}' is not a cluster service address")]
    NotForwardable { address: String },

    #[error("transport unavailable for {address}: {reason}")]
    Unavailable { address: String, reason: String },

    #[error("dial to {address} timed out after {}s", timeout.as_secs())]
    Timeout { address: String, timeout: Duration },
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid address '{address}': {reason}")]
    Address { address: String, reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Trust(#[from] TrustError),

    #[error("TLS handshake with {host} failed: {source}")]
    Handshake {
        host: String,
        source: std::io::Error,
    },

    #[error("HTTP exchange failed: {0}")]
    Http(#[from] hyper::Error),

    #[error("invalid HTTP request: {0}")]
    Request(#[from] http::Error),

    #[error("request to {path} timed out after {}s", timeout.as_secs())]
    Timeout { path: String, timeout: Duration },

    #[error("HTTP {status} from {path}: {body}")]
    Status {
        status: u16,
        path: String,
        body: String,
    },

    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),
}
