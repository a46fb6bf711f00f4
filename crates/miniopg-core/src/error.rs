//! Error types for miniopg-core

use thiserror::Error;

/// Result type alias using miniopg-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in miniopg-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Remote HTTP fetch error
    #[error("HTTP error: {0}")]
    Http(String),
}
