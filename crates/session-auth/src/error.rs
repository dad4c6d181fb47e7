//! Error types for credential storage operations

/// Errors from credential storage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("storage parse error: {0}")]
    Parse(String),

    #[error("serialization error: {0}")]
    Serialize(String),
}

/// Result alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;
