//! Error types for the store module.

use thiserror::Error;

use veil_core::PrincipalId;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// An insert lost the identifier reservation race: a row with the
    /// same principal id already exists. Callers retry with a freshly
    /// sampled id.
    #[error("principal id already taken: {0}")]
    IdCollision(PrincipalId),

    /// Principal not found.
    #[error("principal not found: {0}")]
    PrincipalNotFound(PrincipalId),

    /// Serialization/deserialization of a stored column failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A connection lock or blocking task failed.
    #[error("storage runtime error: {0}")]
    Runtime(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
