//! Secret material resolution.
//!
//! The platform needs three secrets: the blind-index salt, the vault
//! key, and the vault nonce. They are resolved exactly once at process
//! start through the [`SecretStore`] trait - fail fast, never re-read,
//! never mutate after init. A store that cannot be reached makes the
//! process unable to serve, which callers surface as an upstream
//! failure.

use std::fmt;

use thiserror::Error;
use veil_core::IndexSalt;

use crate::crypto::{VaultKey, VaultNonce};

/// Errors that can occur while resolving secrets.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The named secret is not present in the store.
    #[error("missing secret: {0}")]
    Missing(String),

    /// The named secret is present but unusable.
    #[error("invalid secret {name}: {reason}")]
    Invalid { name: String, reason: String },

    /// The secret store itself could not be reached.
    #[error("secret store unavailable: {0}")]
    Unavailable(String),
}

/// The resolved secret bundle.
#[derive(Clone)]
pub struct Secrets {
    pub index_salt: IndexSalt,
    pub vault_key: VaultKey,
    pub vault_nonce: VaultNonce,
}

impl Secrets {
    /// Random secrets for tests. Digests and blobs made with these do
    /// not survive the process.
    pub fn ephemeral() -> Self {
        Self {
            index_salt: IndexSalt::generate(),
            vault_key: VaultKey::generate(),
            vault_nonce: VaultNonce::generate(),
        }
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secrets(..)")
    }
}

/// The boundary to wherever secrets actually live.
pub trait SecretStore {
    /// Resolve the full bundle. Called once at startup.
    fn load(&self) -> Result<Secrets, SecretError>;
}

/// Environment variable names read by [`EnvSecretStore`].
pub const ENV_INDEX_SALT: &str = "VEIL_INDEX_SALT";
pub const ENV_VAULT_KEY: &str = "VEIL_VAULT_KEY";
pub const ENV_VAULT_NONCE: &str = "VEIL_VAULT_NONCE";

/// Secret store backed by process environment variables, each holding
/// hex-encoded key material.
pub struct EnvSecretStore;

impl EnvSecretStore {
    fn read(name: &str) -> Result<String, SecretError> {
        std::env::var(name).map_err(|_| SecretError::Missing(name.to_string()))
    }
}

impl SecretStore for EnvSecretStore {
    fn load(&self) -> Result<Secrets, SecretError> {
        let salt_hex = Self::read(ENV_INDEX_SALT)?;
        let key_hex = Self::read(ENV_VAULT_KEY)?;
        let nonce_hex = Self::read(ENV_VAULT_NONCE)?;

        Ok(Secrets {
            index_salt: IndexSalt::from_hex(&salt_hex).map_err(|e| SecretError::Invalid {
                name: ENV_INDEX_SALT.to_string(),
                reason: e.to_string(),
            })?,
            vault_key: VaultKey::from_hex(&key_hex).map_err(|e| SecretError::Invalid {
                name: ENV_VAULT_KEY.to_string(),
                reason: e.to_string(),
            })?,
            vault_nonce: VaultNonce::from_hex(&nonce_hex).map_err(|e| SecretError::Invalid {
                name: ENV_VAULT_NONCE.to_string(),
                reason: e.to_string(),
            })?,
        })
    }
}
