//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite -
//! including the id-collision signal - but keeps everything in memory
//! with no persistence.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use veil_core::{Level, PredicateGroup, PrincipalId, StoredValue};

use crate::error::{Result, StoreError};
use crate::records::{OnboardingBatch, PrincipalRecord, RoleRecord};
use crate::traits::Store;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Credential rows by principal id.
    principals: HashMap<PrincipalId, PrincipalRecord>,

    /// Roles by name.
    roles: HashMap<String, RoleRecord>,

    /// Hashed-PII rows: level -> principal id -> field -> stored value.
    pii: HashMap<Level, HashMap<PrincipalId, HashMap<String, StoredValue>>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_principal(&self, id: &PrincipalId) -> Result<Option<PrincipalRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.principals.get(id).cloned())
    }

    async fn principal_exists(&self, id: &PrincipalId) -> Result<bool> {
        let inner = self.inner.read().unwrap();
        Ok(inner.principals.contains_key(id))
    }

    async fn assign_scopes(&self, id: &PrincipalId, scopes: Vec<String>) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        match inner.principals.get_mut(id) {
            Some(principal) => {
                principal.scopes = scopes;
                Ok(())
            }
            None => Err(StoreError::PrincipalNotFound(id.clone())),
        }
    }

    async fn get_roles(&self, names: &[String]) -> Result<Vec<RoleRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(names
            .iter()
            .filter_map(|name| inner.roles.get(name).cloned())
            .collect())
    }

    async fn upsert_role(&self, role: &RoleRecord) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.roles.insert(role.name.clone(), role.clone());
        Ok(())
    }

    async fn lookup_ids(&self, group: &PredicateGroup) -> Result<BTreeSet<PrincipalId>> {
        let inner = self.inner.read().unwrap();

        if group.predicates.is_empty() {
            return Ok(BTreeSet::new());
        }

        let Some(rows) = inner.pii.get(&group.level) else {
            return Ok(BTreeSet::new());
        };

        let ids = rows
            .iter()
            .filter(|(_, fields)| {
                group.predicates.iter().all(|predicate| {
                    fields
                        .get(&predicate.field)
                        .map_or(false, |stored| predicate.values.contains(stored))
                })
            })
            .map(|(id, _)| id.clone())
            .collect();

        Ok(ids)
    }

    async fn pii_row_exists(&self, id: &PrincipalId) -> Result<bool> {
        let inner = self.inner.read().unwrap();
        Ok(inner.pii.values().any(|rows| rows.contains_key(id)))
    }

    async fn apply_onboarding(&self, batch: &OnboardingBatch) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let id = &batch.principal.id;

        // The whole check runs under the write lock, so the reservation
        // is atomic exactly like the SQLite primary-key constraint.
        if inner.principals.contains_key(id)
            || inner.pii.values().any(|rows| rows.contains_key(id))
        {
            return Err(StoreError::IdCollision(id.clone()));
        }

        inner
            .principals
            .insert(id.clone(), batch.principal.clone());

        for row in &batch.rows {
            inner
                .pii
                .entry(row.level)
                .or_default()
                .insert(id.clone(), row.fields.iter().cloned().collect());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_core::{PrincipalClass, TokenizedPredicate};

    use crate::records::LevelRow;

    fn batch(id: &str, digest: &str) -> OnboardingBatch {
        OnboardingBatch {
            principal: PrincipalRecord {
                id: PrincipalId::from(id),
                credential_digest: "cred".to_string(),
                scopes: vec!["*".to_string()],
                class: PrincipalClass::Customer,
            },
            rows: vec![LevelRow {
                level: Level::Identity,
                fields: vec![(
                    "firstname".to_string(),
                    StoredValue::Digest(digest.to_string()),
                )],
            }],
        }
    }

    #[tokio::test]
    async fn test_collision_semantics_match_sqlite() {
        let store = MemoryStore::new();
        store.apply_onboarding(&batch("1000000001", "aa")).await.unwrap();

        let err = store
            .apply_onboarding(&batch("1000000001", "bb"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IdCollision(_)));
    }

    #[tokio::test]
    async fn test_lookup_matches_stored_digest() {
        let store = MemoryStore::new();
        store.apply_onboarding(&batch("1000000001", "aa")).await.unwrap();
        store.apply_onboarding(&batch("1000000002", "bb")).await.unwrap();

        let group = PredicateGroup {
            level: Level::Identity,
            predicates: vec![TokenizedPredicate {
                field: "firstname".to_string(),
                values: vec![StoredValue::Digest("aa".to_string())],
            }],
        };

        let ids = store.lookup_ids(&group).await.unwrap();
        assert_eq!(ids.len(), 1);
        assert!(ids.contains(&PrincipalId::from("1000000001")));
    }

    #[tokio::test]
    async fn test_missing_column_never_matches() {
        let store = MemoryStore::new();
        store.apply_onboarding(&batch("1000000001", "aa")).await.unwrap();

        let group = PredicateGroup {
            level: Level::Identity,
            predicates: vec![TokenizedPredicate {
                field: "lastname".to_string(),
                values: vec![StoredValue::Digest("aa".to_string())],
            }],
        };

        assert!(store.lookup_ids(&group).await.unwrap().is_empty());
    }
}
