//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {url} returned unexpected status {status}")]
    UnexpectedStatus {
        method: String,
        url: String,
        status: u16,
    },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("repository {repository} has format {format}, only raw is supported")]
    FormatMismatch { repository: String, format: String },

    #[error("upload of {name} not visible after {attempts} searches")]
    UploadNotConfirmed { name: String, attempts: u32 },

    #[error("asset index is stale: {0}")]
    IndexStale(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl StorageError {
    /// Whether the error means "no such object" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
