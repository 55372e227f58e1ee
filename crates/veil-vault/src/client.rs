//! The vault client boundary.
//!
//! Callers in other services never hold a [`Vault`](crate::Vault)
//! directly; they talk through [`VaultClient`], which makes the
//! cross-service call graph explicit. The contract is deliberately
//! strict: calls are synchronous request/response with no internal
//! retry, backoff, or partial results - an [`Unavailable`] outcome is
//! fatal to whatever operation the caller was running, and the caller
//! must not leave local state partially committed because of it.
//!
//! [`Unavailable`]: VaultClientError::Unavailable

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use veil_core::{FieldValue, Level, PrincipalId};

use crate::blob::BlobStore;
use crate::error::VaultError;
use crate::service::Vault;

/// Errors surfaced across the vault boundary.
#[derive(Debug, Error)]
pub enum VaultClientError {
    /// The request named a field or level the vault does not know.
    /// `detail` carries the valid alternatives.
    #[error("vault rejected the request: {message}")]
    InvalidRequest {
        message: String,
        detail: Vec<String>,
    },

    /// No blob stored for the requested (principal, level) pair.
    #[error("no encrypted data found for principal {principal} level {level}")]
    NotFound {
        principal: PrincipalId,
        level: String,
    },

    /// The vault could not be reached. Fatal to the enclosing operation.
    #[error("vault unavailable: {0}")]
    Unavailable(String),

    /// The vault failed internally (including decryption failures, which
    /// mean corrupted blobs or wrong key material).
    #[error("vault internal error: {0}")]
    Internal(String),
}

impl From<VaultError> for VaultClientError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::UnknownField {
                ref available_fields,
                ..
            } => VaultClientError::InvalidRequest {
                message: e.to_string(),
                detail: available_fields.clone(),
            },
            VaultError::UnknownLevel {
                ref valid_levels, ..
            } => VaultClientError::InvalidRequest {
                message: e.to_string(),
                detail: valid_levels.clone(),
            },
            VaultError::NotFound { principal, level } => {
                VaultClientError::NotFound { principal, level }
            }
            VaultError::Database(e) => VaultClientError::Unavailable(e.to_string()),
            VaultError::Runtime(e) => VaultClientError::Unavailable(e),
            other => VaultClientError::Internal(other.to_string()),
        }
    }
}

/// Client interface to the vault service.
#[async_trait]
pub trait VaultClient: Send + Sync {
    /// Encrypt and store a principal's plaintext fields; returns the
    /// levels processed.
    async fn put(
        &self,
        principal: &PrincipalId,
        fields: &BTreeMap<String, FieldValue>,
    ) -> Result<Vec<Level>, VaultClientError>;

    /// Fetch a principal's decrypted field map for one level.
    async fn get(
        &self,
        principal: &PrincipalId,
        level: Level,
    ) -> Result<BTreeMap<String, FieldValue>, VaultClientError>;
}

/// In-process client wrapping a [`Vault`] directly.
pub struct LocalVaultClient<B: BlobStore> {
    vault: Arc<Vault<B>>,
}

impl<B: BlobStore> LocalVaultClient<B> {
    /// Wrap a vault service.
    pub fn new(vault: Arc<Vault<B>>) -> Self {
        Self { vault }
    }
}

#[async_trait]
impl<B: BlobStore> VaultClient for LocalVaultClient<B> {
    async fn put(
        &self,
        principal: &PrincipalId,
        fields: &BTreeMap<String, FieldValue>,
    ) -> Result<Vec<Level>, VaultClientError> {
        Ok(self.vault.put(principal, fields).await?)
    }

    async fn get(
        &self,
        principal: &PrincipalId,
        level: Level,
    ) -> Result<BTreeMap<String, FieldValue>, VaultClientError> {
        Ok(self.vault.get(principal, level).await?)
    }
}
