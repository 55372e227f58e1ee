//! Error types for the vault.

use thiserror::Error;

use veil_core::PrincipalId;

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A field in an encrypt request has no catalog mapping.
    #[error("invalid field: {field}. No level mapping found.")]
    UnknownField {
        field: String,
        available_fields: Vec<String>,
    },

    /// A decrypt request named a level that is not a known owning
    /// entity.
    #[error("invalid level: {given}")]
    UnknownLevel {
        given: String,
        valid_levels: Vec<String>,
    },

    /// No blob stored for this (principal, level) pair.
    #[error("no encrypted data found for principal {principal} level {level}")]
    NotFound {
        principal: PrincipalId,
        level: String,
    },

    /// Encryption failed.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Decryption failed (wrong key material or corrupted blob).
    #[error("decryption error: {0}")]
    DecryptionError(String),

    /// Payload serialization/deserialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Database error from the blob store.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A connection lock or blocking task failed.
    #[error("storage runtime error: {0}")]
    Runtime(String),
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
