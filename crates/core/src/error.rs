//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("manifest write error: {0}")]
    ManifestWrite(#[from] std::io::Error),

    #[error("manifest archive error: {0}")]
    ManifestArchive(#[from] zip::result::ZipError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
