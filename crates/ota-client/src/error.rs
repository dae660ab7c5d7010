//! Error types for OTA client operations

use thiserror::Error;

/// Result type alias for OTA client operations
pub type Result<T> = std::result::Result<T, OtaError>;

/// Errors that can occur while talking to a distribution
#[derive(Error, Debug)]
pub enum OtaError {
    /// Distribution hash was empty or blank
    #[error("invalid distribution hash: {0:?}")]
    InvalidDistributionHash(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Server answered with an unexpected status code
    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// Failed to parse a response body
    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl OtaError {
    /// Create an error for a non-success status code
    pub fn unexpected_status(status: u16, url: impl Into<String>) -> Self {
        Self::UnexpectedStatus {
            status,
            url: url.into(),
        }
    }

    /// Status code carried by the error, when there is one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
