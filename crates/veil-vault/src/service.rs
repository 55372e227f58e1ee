//! The vault service: the logical encrypt/decrypt operations.
//!
//! `put` accepts a principal's plaintext field map, partitions it by
//! owning level, and stores one encrypted blob per level. Callers must
//! supply the COMPLETE field set belonging to a level on every write:
//! an existing blob for that (principal, level) is replaced wholesale,
//! so fields omitted from a rewrite are permanently lost.

use std::collections::BTreeMap;
use std::sync::Arc;

use veil_core::{decode_fields, encode_fields, FieldCatalog, FieldValue, Level, PrincipalId};

use crate::blob::BlobStore;
use crate::crypto::{VaultKey, VaultNonce};
use crate::error::{Result, VaultError};

/// The vault service over some blob persistence.
pub struct Vault<B: BlobStore> {
    catalog: Arc<FieldCatalog>,
    key: VaultKey,
    nonce: VaultNonce,
    store: B,
}

impl<B: BlobStore> Vault<B> {
    /// Build the vault from its key material and storage.
    pub fn new(catalog: Arc<FieldCatalog>, key: VaultKey, nonce: VaultNonce, store: B) -> Self {
        Self {
            catalog,
            key,
            nonce,
            store,
        }
    }

    /// Encrypt and store a principal's field map.
    ///
    /// Fields are grouped by owning level; one blob is written per level
    /// present in `fields`, in a single storage transaction. Returns the
    /// levels processed, in deterministic order.
    pub async fn put(
        &self,
        principal: &PrincipalId,
        fields: &BTreeMap<String, FieldValue>,
    ) -> Result<Vec<Level>> {
        let mut by_level: BTreeMap<Level, BTreeMap<String, FieldValue>> = BTreeMap::new();

        for (name, value) in fields {
            let def = self
                .catalog
                .lookup(name)
                .ok_or_else(|| VaultError::UnknownField {
                    field: name.clone(),
                    available_fields: self
                        .catalog
                        .field_names()
                        .iter()
                        .map(|f| f.to_string())
                        .collect(),
                })?;

            by_level
                .entry(def.level)
                .or_default()
                .insert(name.clone(), value.clone());
        }

        let mut blobs = Vec::with_capacity(by_level.len());
        for (level, level_fields) in &by_level {
            let payload = encode_fields(level_fields)
                .map_err(|e| VaultError::SerializationError(e.to_string()))?;
            blobs.push((*level, self.key.seal(&payload, &self.nonce)?));
        }

        self.store.upsert_blobs(principal, blobs).await?;

        Ok(by_level.keys().copied().collect())
    }

    /// Fetch and decrypt a principal's field map for one level, named by
    /// its wire string.
    ///
    /// Fails with `UnknownLevel` when the name is not a known owning
    /// entity, and `NotFound` when no blob exists for the pair.
    pub async fn get_named(
        &self,
        principal: &PrincipalId,
        level: &str,
    ) -> Result<BTreeMap<String, FieldValue>> {
        let parsed = level.parse::<Level>().map_err(|_| VaultError::UnknownLevel {
            given: level.to_string(),
            valid_levels: self
                .catalog
                .levels()
                .iter()
                .map(|l| l.as_str().to_string())
                .collect(),
        })?;

        self.get(principal, parsed).await
    }

    /// Fetch and decrypt a principal's field map for one level.
    pub async fn get(
        &self,
        principal: &PrincipalId,
        level: Level,
    ) -> Result<BTreeMap<String, FieldValue>> {
        let blob = self
            .store
            .get_blob(principal, level)
            .await?
            .ok_or_else(|| VaultError::NotFound {
                principal: principal.clone(),
                level: level.as_str().to_string(),
            })?;

        let payload = self.key.open(&blob, &self.nonce)?;
        decode_fields(&payload).map_err(|e| VaultError::SerializationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;

    fn vault() -> Vault<MemoryBlobStore> {
        Vault::new(
            Arc::new(FieldCatalog::builtin()),
            VaultKey::from_bytes([0x11; 32]),
            VaultNonce::from_bytes([0x22; 12]),
            MemoryBlobStore::new(),
        )
    }

    fn fields(pairs: &[(&str, FieldValue)]) -> BTreeMap<String, FieldValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_put_get_round_trip_per_level() {
        let vault = vault();
        let id = PrincipalId::from("1000000001");

        let all = fields(&[
            ("firstname", FieldValue::from("Alice")),
            ("age", FieldValue::Num(30.0)),
            ("pincode", FieldValue::from("560001")),
        ]);

        let levels = vault.put(&id, &all).await.unwrap();
        assert_eq!(levels, vec![Level::Identity, Level::Residence]);

        let identity = vault.get(&id, Level::Identity).await.unwrap();
        assert_eq!(
            identity,
            fields(&[
                ("firstname", FieldValue::from("Alice")),
                ("age", FieldValue::Num(30.0)),
            ])
        );

        let residence = vault.get(&id, Level::Residence).await.unwrap();
        assert_eq!(residence, fields(&[("pincode", FieldValue::from("560001"))]));
    }

    #[tokio::test]
    async fn test_rewrite_replaces_the_whole_level() {
        let vault = vault();
        let id = PrincipalId::from("1000000001");

        vault
            .put(
                &id,
                &fields(&[
                    ("firstname", FieldValue::from("Alice")),
                    ("lastname", FieldValue::from("Smith")),
                ]),
            )
            .await
            .unwrap();

        // A partial rewrite drops the omitted field for good.
        vault
            .put(&id, &fields(&[("firstname", FieldValue::from("Alicia"))]))
            .await
            .unwrap();

        let identity = vault.get(&id, Level::Identity).await.unwrap();
        assert_eq!(identity, fields(&[("firstname", FieldValue::from("Alicia"))]));
    }

    #[tokio::test]
    async fn test_unknown_field_lists_valid_names() {
        let vault = vault();
        let id = PrincipalId::from("1000000001");

        let err = vault
            .put(&id, &fields(&[("ssn", FieldValue::from("000"))]))
            .await
            .unwrap_err();

        match err {
            VaultError::UnknownField {
                field,
                available_fields,
            } => {
                assert_eq!(field, "ssn");
                assert!(available_fields.contains(&"firstname".to_string()));
                assert!(available_fields.contains(&"pincode".to_string()));
            }
            other => panic!("expected UnknownField, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_level_lists_valid_levels() {
        let vault = vault();
        let err = vault
            .get_named(&PrincipalId::from("1000000001"), "userdata")
            .await
            .unwrap_err();

        match err {
            VaultError::UnknownLevel {
                given,
                valid_levels,
            } => {
                assert_eq!(given, "userdata");
                assert_eq!(valid_levels, vec!["identity", "residence"]);
            }
            other => panic!("expected UnknownLevel, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_blob_is_not_found() {
        let vault = vault();
        let err = vault
            .get_named(&PrincipalId::from("1000000001"), "identity")
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_vault_never_returns_digests() {
        let vault = vault();
        let id = PrincipalId::from("1000000001");

        vault
            .put(&id, &fields(&[("firstname", FieldValue::from("Alice"))]))
            .await
            .unwrap();

        // What comes back is the plaintext that went in, not any hashed
        // representation.
        let identity = vault.get(&id, Level::Identity).await.unwrap();
        assert_eq!(identity["firstname"], FieldValue::from("Alice"));
    }
}
