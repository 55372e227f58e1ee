//! Store trait: the abstract interface for durable platform state.
//!
//! This trait keeps the engine storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (for tests).

use std::collections::BTreeSet;

use async_trait::async_trait;
use veil_core::{PredicateGroup, PrincipalId};

use crate::error::Result;
use crate::records::{OnboardingBatch, PrincipalRecord, RoleRecord};

/// The Store trait: async interface for principal, role, and hash-index
/// persistence.
///
/// All methods are async to support both sync (SQLite) and async
/// backends. For SQLite, `spawn_blocking` is used internally to avoid
/// blocking the runtime.
///
/// # Design Notes
///
/// - **No authoritative caching**: every call reads or writes durable
///   state; the only process-wide shared state in the platform is the
///   read-only field catalog.
/// - **Atomic onboarding**: [`apply_onboarding`](Store::apply_onboarding)
///   commits the credential row and every hashed row in one transaction,
///   and surfaces a lost id-reservation race as
///   [`StoreError::IdCollision`](crate::StoreError::IdCollision).
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Principal Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch a credential row by principal id.
    async fn get_principal(&self, id: &PrincipalId) -> Result<Option<PrincipalRecord>>;

    /// Whether a credential row exists for this id.
    async fn principal_exists(&self, id: &PrincipalId) -> Result<bool>;

    /// Replace a principal's raw scope list (the scope-assignment
    /// operation of the administrative surface).
    ///
    /// Fails with `PrincipalNotFound` if the principal does not exist.
    async fn assign_scopes(&self, id: &PrincipalId, scopes: Vec<String>) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Role Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch the roles with the given names. Unknown names are simply
    /// absent from the result; that is not an error.
    async fn get_roles(&self, names: &[String]) -> Result<Vec<RoleRecord>>;

    /// Create or replace a role definition.
    async fn upsert_role(&self, role: &RoleRecord) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Hash-Index Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Execute one level's predicate group against its hashed-PII table,
    /// returning the ids whose stored row satisfies every predicate
    /// (predicates within a group are combined with AND; a multi-valued
    /// predicate is set-membership).
    async fn lookup_ids(&self, group: &PredicateGroup) -> Result<BTreeSet<PrincipalId>>;

    /// Whether any hashed-PII table holds a row for this id. Used by the
    /// advisory half of identifier reservation.
    async fn pii_row_exists(&self, id: &PrincipalId) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Onboarding
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply all local onboarding writes in one transaction.
    ///
    /// Returns `IdCollision` when the principal id was taken between
    /// sampling and commit; the caller retries with a fresh id.
    async fn apply_onboarding(&self, batch: &OnboardingBatch) -> Result<()>;
}
