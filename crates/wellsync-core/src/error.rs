//! Error types for wellsync-core

use thiserror::Error;

/// Result type alias using wellsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in wellsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local storage failure (disk full, corruption, constraint violation).
    ///
    /// Fatal to the operation in progress and never retried automatically.
    #[error("Data could not be saved locally: {0}")]
    Storage(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry not found
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not allowed in the entry's current sync state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns true for local storage failures.
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
