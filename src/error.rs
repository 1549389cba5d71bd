//! Error types for dyndns-updater.

use thiserror::Error;

/// Result type alias for dyndns-updater.
pub type Result<T> = std::result::Result<T, DdnsError>;

/// DDNS error types.
#[derive(Error, Debug)]
pub enum DdnsError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network failure: connection, DNS, timeout or unreadable body.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Unexpected HTTP status.
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// Response body is not an IP address.
    #[error("Invalid IP address: {0}")]
    InvalidAddress(String),

    /// The provider answered without a success marker. Carries the body verbatim.
    #[error("{0}")]
    ProviderRejected(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DdnsError {
    /// Whether this error happened at the network/HTTP layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, DdnsError::Transport(_) | DdnsError::HttpStatus(_))
    }
}

impl From<reqwest::Error> for DdnsError {
    fn from(e: reqwest::Error) -> Self {
        DdnsError::Transport(e.to_string())
    }
}

impl From<toml::de::Error> for DdnsError {
    fn from(e: toml::de::Error) -> Self {
        DdnsError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for DdnsError {
    fn from(e: toml::ser::Error) -> Self {
        DdnsError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for DdnsError {
    fn from(e: serde_json::Error) -> Self {
        DdnsError::Serialization(e.to_string())
    }
}
