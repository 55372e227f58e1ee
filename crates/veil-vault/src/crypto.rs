//! The vault cipher: ChaCha20-Poly1305 under deployment-fixed key
//! material.
//!
//! Both the 256-bit key and the 96-bit nonce are loaded once from the
//! secret store at startup and never rotate within a process lifetime,
//! so sealing the same payload always yields the same blob. Per-message
//! nonces are deliberately not used here: a blob is addressed by
//! (principal, level) and replaced wholesale, and the storage layer
//! never needs to compare or deduplicate ciphertexts across keys.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use std::fmt;

use crate::error::{Result, VaultError};

/// A 256-bit symmetric vault key.
#[derive(Clone)]
pub struct VaultKey([u8; 32]);

impl VaultKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse from a hex string, as delivered by the secret store.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| VaultError::SerializationError(e.to_string()))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            VaultError::SerializationError("vault key must be 32 bytes".to_string())
        })?;
        Ok(Self(arr))
    }

    /// Generate a random key. Only sensible for tests; production keys
    /// come from the secret store so blobs survive restarts.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Encrypt a payload under this key and the given nonce.
    pub fn seal(&self, plaintext: &[u8], nonce: &VaultNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| VaultError::EncryptionError(e.to_string()))?;

        cipher
            .encrypt(Nonce::from_slice(&nonce.0), plaintext)
            .map_err(|e| VaultError::EncryptionError(e.to_string()))
    }

    /// Decrypt a blob sealed under this key and the given nonce.
    pub fn open(&self, ciphertext: &[u8], nonce: &VaultNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| VaultError::DecryptionError(e.to_string()))?;

        cipher
            .decrypt(Nonce::from_slice(&nonce.0), ciphertext)
            .map_err(|e| VaultError::DecryptionError(e.to_string()))
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material.
        f.write_str("VaultKey(..)")
    }
}

/// The 96-bit deployment-fixed nonce.
#[derive(Clone)]
pub struct VaultNonce([u8; 12]);

impl VaultNonce {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Parse from a hex string, as delivered by the secret store.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| VaultError::SerializationError(e.to_string()))?;
        let arr: [u8; 12] = bytes.try_into().map_err(|_| {
            VaultError::SerializationError("vault nonce must be 12 bytes".to_string())
        })?;
        Ok(Self(arr))
    }

    /// Generate a random nonce. Only sensible for tests.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 12];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }
}

impl fmt::Debug for VaultNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultNonce(..)")
    }
}
