//! Error types for lbcheck-core

use thiserror::Error;

/// Result type alias for lbcheck operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the file server and the load balancer probe
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid HTTP method
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Invalid or missing configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS error
    #[error("TLS error: {0}")]
    Tls(String),

    /// A probe could not complete (connect, timeout, body read)
    #[error("Network error: {0}")]
    Network(String),

    /// A probe completed with a non-success status
    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for errors raised by a single probe request
    pub fn is_probe_failure(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Status { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_failure_classification() {
        assert!(Error::Network("refused".into()).is_probe_failure());
        assert!(Error::Status { status: 503, url: "https://lb/".into() }.is_probe_failure());
        assert!(!Error::Config("empty host_list".into()).is_probe_failure());
    }

    #[test]
    fn test_status_display() {
        let err = Error::Status { status: 502, url: "https://lb.example/".into() };
        assert_eq!(err.to_string(), "Unexpected status 502 from https://lb.example/");
    }
}
