//! Error types for the Veil core primitives.

use thiserror::Error;

/// Errors that can occur in pure core computations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed scope string: {0:?}")]
    MalformedScope(String),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("unknown level: {0}")]
    UnknownLevel(String),

    #[error("field {field} expects a {expected} value, got {got:?}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        got: String,
    },

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
