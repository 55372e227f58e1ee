//! Row types exchanged with the store.

use veil_core::{Level, PrincipalClass, PrincipalId, StoredValue};

/// A credential-table row.
#[derive(Debug, Clone, PartialEq)]
pub struct PrincipalRecord {
    pub id: PrincipalId,

    /// Blind-index digest of the principal's secret. Plaintext
    /// credentials never reach storage.
    pub credential_digest: String,

    /// Raw granted scope strings, in grant order. May contain `assume:`
    /// role references; expansion happens at resolve time, not here.
    pub scopes: Vec<String>,

    pub class: PrincipalClass,
}

/// A role-table row.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleRecord {
    /// Unique role name, referenced by principals as `assume:<name>`.
    pub name: String,

    /// The scopes this role grants. Role references inside this list are
    /// never expanded.
    pub scopes: Vec<String>,
}

/// One hashed-PII row staged for a single owning level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelRow {
    pub level: Level,
    /// (field name, stored representation) pairs; field names come from
    /// the catalog.
    pub fields: Vec<(String, StoredValue)>,
}

/// Everything onboarding writes locally, applied in one transaction.
///
/// The credential row and every hashed row commit together or not at
/// all; the principal-id primary key is the authoritative reservation.
#[derive(Debug, Clone, PartialEq)]
pub struct OnboardingBatch {
    pub principal: PrincipalRecord,
    pub rows: Vec<LevelRow>,
}
