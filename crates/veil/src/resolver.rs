//! Scope resolution: a principal's effective permission set.
//!
//! A principal's grant list mixes direct scopes with `assume:<role>`
//! references. Resolution partitions the list, looks the named roles up,
//! and unions the role scopes into the effective set - exactly one level
//! deep. A role's own scope list is taken verbatim: role references
//! inside it do not parse as scopes and so are never re-expanded.
//! Unknown role names are silently dropped, not errors.

use veil_core::{partition_grants, PrincipalId, Scope, ScopeSet};
use veil_store::Store;

use crate::error::{EngineError, Result};

/// Compute a principal's effective scope set.
///
/// Fails with `PrincipalNotFound` if the principal does not exist. The
/// result is always a superset of the principal's parseable direct
/// scopes.
pub async fn resolve_scopes<S: Store + ?Sized>(
    store: &S,
    principal_id: &PrincipalId,
) -> Result<ScopeSet> {
    let principal = store
        .get_principal(principal_id)
        .await?
        .ok_or_else(|| EngineError::PrincipalNotFound(principal_id.clone()))?;

    let (direct, role_names) = partition_grants(&principal.scopes);
    let mut effective: ScopeSet = direct.into_iter().collect();

    let roles = store.get_roles(&role_names).await?;
    for role in roles {
        for grant in &role.scopes {
            if let Ok(scope) = grant.parse::<Scope>() {
                effective.insert(scope);
            }
        }
    }

    Ok(effective)
}
