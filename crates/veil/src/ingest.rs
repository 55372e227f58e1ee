//! The ingestion pipeline: onboarding a new principal.
//!
//! Onboarding tokenizes the candidate fields locally, writes the
//! plaintext to the vault, and only then commits the local rows - the
//! credential row and every hashed row - in one store transaction. Any
//! failure before or during the vault call leaves no local state at
//! all. A local failure AFTER the vault call has taken effect cannot be
//! compensated automatically: the vault keeps blobs the local side does
//! not acknowledge. That gap is logged loudly and, for the id-collision
//! case, retried under a fresh identifier.

use std::collections::BTreeMap;

use veil_core::{Level, PrincipalClass, PrincipalId, StoredValue};
use veil_store::{LevelRow, OnboardingBatch, PrincipalRecord, Store, StoreError};
use veil_vault::VaultClient;

use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::request::{OnboardRequest, OnboardResponse};

impl<S: Store, V: VaultClient> Engine<S, V> {
    /// Onboard a new principal.
    pub async fn onboard(&self, request: &OnboardRequest) -> Result<OnboardResponse> {
        let rows = self.tokenize_rows(&request.fields)?;

        // Reject duplicates by natural key before reserving anything.
        if self.natural_key_exists(&request.fields).await? {
            return Err(EngineError::NaturalKeyExists);
        }

        let scopes = match request.class {
            PrincipalClass::Customer => vec!["*".to_string()],
            _ => Vec::new(),
        };
        let credential_digest = self.tokenizer().digest_secret(&request.credential);

        let mut attempts = 0;
        loop {
            attempts += 1;
            if attempts > self.config().max_id_attempts {
                return Err(EngineError::Internal(format!(
                    "identifier sampling exhausted after {} attempts",
                    self.config().max_id_attempts
                )));
            }

            // Advisory availability check across both stores. The
            // primary-key constraint at commit is what actually settles
            // concurrent reservations.
            let id = PrincipalId::sample(&mut rand::thread_rng());
            if self.store().principal_exists(&id).await?
                || self.store().pii_row_exists(&id).await?
            {
                continue;
            }

            // The vault write goes first: local state must only commit
            // once the remote side has succeeded, so a vault failure
            // leaves nothing behind.
            self.vault().put(&id, &request.fields).await?;

            let batch = OnboardingBatch {
                principal: PrincipalRecord {
                    id: id.clone(),
                    credential_digest: credential_digest.clone(),
                    scopes: scopes.clone(),
                    class: request.class,
                },
                rows: rows.clone(),
            };

            match self.store().apply_onboarding(&batch).await {
                Ok(()) => {
                    return Ok(OnboardResponse {
                        message: "Principal onboarded successfully".to_string(),
                        principal_id: id,
                    })
                }
                Err(StoreError::IdCollision(taken)) => {
                    // The reservation race was lost after the vault call
                    // already took effect; the blobs written under the
                    // contested id cannot be rolled back from here.
                    tracing::error!(
                        principal_id = %taken,
                        "id reservation lost after vault write; encrypted blobs under this id may be stale"
                    );
                    continue;
                }
                Err(other) => {
                    tracing::error!(
                        principal_id = %id,
                        error = %other,
                        "local onboarding commit failed after vault write; vault state for this id is orphaned"
                    );
                    return Err(EngineError::Internal(other.to_string()));
                }
            }
        }
    }

    /// Validate the candidate fields and stage hashed rows per level.
    fn tokenize_rows(
        &self,
        fields: &BTreeMap<String, veil_core::FieldValue>,
    ) -> Result<Vec<LevelRow>> {
        let natural = self.catalog().natural_key();
        if !fields.contains_key(natural) {
            return Err(EngineError::Validation(format!(
                "missing required field: {natural}"
            )));
        }

        let mut by_level: BTreeMap<Level, Vec<(String, StoredValue)>> = BTreeMap::new();

        for (name, value) in fields {
            let def = self.catalog().lookup(name).ok_or_else(|| {
                EngineError::Validation(format!("unknown field: {name}"))
            })?;

            let stored = self
                .tokenizer()
                .tokenize(value, def.value_type)
                .map_err(|_| {
                    EngineError::Validation(format!(
                        "field {name} expects a {} value",
                        def.value_type
                    ))
                })?;

            by_level
                .entry(def.level)
                .or_default()
                .push((name.clone(), stored));
        }

        Ok(by_level
            .into_iter()
            .map(|(level, fields)| LevelRow { level, fields })
            .collect())
    }

    /// Whether the request's natural key already exists among onboarded
    /// records.
    async fn natural_key_exists(
        &self,
        fields: &BTreeMap<String, veil_core::FieldValue>,
    ) -> Result<bool> {
        let natural = self.catalog().natural_key();
        let def = self
            .catalog()
            .lookup(natural)
            .ok_or_else(|| EngineError::Internal("natural key missing from catalog".into()))?;
        let value = fields
            .get(natural)
            .ok_or_else(|| EngineError::Validation(format!("missing required field: {natural}")))?;

        let stored = self
            .tokenizer()
            .tokenize(value, def.value_type)
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        let group = veil_core::PredicateGroup {
            level: def.level,
            predicates: vec![veil_core::TokenizedPredicate {
                field: natural.to_string(),
                values: vec![stored],
            }],
        };

        Ok(!self.store().lookup_ids(&group).await?.is_empty())
    }
}
