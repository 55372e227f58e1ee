//! Error types for the engine.
//!
//! The taxonomy mirrors what crosses the wire: validation failures carry
//! structured offending-field detail, permission failures carry the
//! exact scopes that would resolve them, and internal failures never
//! leak their cause into the caller-visible message.

use serde::Serialize;
use thiserror::Error;

use veil_core::PrincipalId;
use veil_store::StoreError;
use veil_vault::VaultClientError;

/// One denied predicate field and the exact scope that would allow it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeniedField {
    pub field: String,
    pub required_scope: String,
}

/// One rejected aggregate field with its expected/actual classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateFieldError {
    pub field: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested operation is not one of the valid set.
    #[error("invalid operation: {got}")]
    InvalidOperation {
        got: String,
        valid: Vec<&'static str>,
    },

    /// sum/avg was requested without any aggregate field.
    #[error("{operation} operation requires at least one numeric field")]
    MissingAggregateFields {
        operation: &'static str,
        available_numeric_fields: Vec<String>,
    },

    /// One or more aggregate fields are unknown or non-numeric.
    #[error("invalid operation fields")]
    InvalidAggregateFields { errors: Vec<AggregateFieldError> },

    /// Other request-shape problems detected before any store access.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The caller lacks the baseline capability for the endpoint.
    #[error("insufficient permissions")]
    MissingScopes { missing_scopes: Vec<String> },

    /// The caller lacks read scopes for some predicate fields.
    #[error("access denied for some fields")]
    FieldsDenied { denied_fields: Vec<DeniedField> },

    /// The caller (or onboarding target) does not exist.
    #[error("principal not found: {0}")]
    PrincipalNotFound(PrincipalId),

    /// An onboarding request repeated an existing natural key.
    #[error("a principal with this contact number already exists")]
    NaturalKeyExists,

    /// The vault or secret store could not be reached; the whole
    /// enclosing operation is aborted with no partial result.
    #[error("upstream unavailable: {0}")]
    Upstream(String),

    /// Unexpected failure. The payload is for server-side logs only and
    /// never appears in the caller-visible message.
    #[error("internal error")]
    Internal(String),
}

impl EngineError {
    /// Coarse classification used by transport adapters picking status
    /// codes.
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::InvalidOperation { .. }
            | EngineError::MissingAggregateFields { .. }
            | EngineError::InvalidAggregateFields { .. }
            | EngineError::Validation(_) => ErrorClass::Validation,
            EngineError::MissingScopes { .. } | EngineError::FieldsDenied { .. } => {
                ErrorClass::PermissionDenied
            }
            EngineError::PrincipalNotFound(_) => ErrorClass::NotFound,
            EngineError::NaturalKeyExists => ErrorClass::Conflict,
            EngineError::Upstream(_) => ErrorClass::Upstream,
            EngineError::Internal(_) => ErrorClass::Internal,
        }
    }
}

/// The error taxonomy a transport maps onto its status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    PermissionDenied,
    NotFound,
    Conflict,
    Upstream,
    Internal,
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::PrincipalNotFound(id) => EngineError::PrincipalNotFound(id),
            other => EngineError::Internal(other.to_string()),
        }
    }
}

impl From<VaultClientError> for EngineError {
    fn from(e: VaultClientError) -> Self {
        match e {
            VaultClientError::Unavailable(msg) => EngineError::Upstream(msg),
            VaultClientError::InvalidRequest { message, .. } => EngineError::Validation(message),
            other => EngineError::Internal(other.to_string()),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
