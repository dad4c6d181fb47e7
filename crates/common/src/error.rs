//! Common error types

use thiserror::Error;

/// Configuration and file-level errors shared by the client crates and the CLI
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Shorthand for a configuration error with a formatted message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;
