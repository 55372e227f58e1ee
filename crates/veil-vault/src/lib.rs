//! # Veil Vault
//!
//! The recoverable half of the platform's PII split: symmetric
//! encryption of complete per-level field maps, stored as one blob per
//! (principal, level).
//!
//! ## Model
//!
//! - A level's blob always holds the COMPLETE field set last written for
//!   that level: writes replace wholesale, they never merge.
//! - Encryption is ChaCha20-Poly1305 under a 256-bit key with a fixed
//!   nonce, both loaded once from the secret store at startup.
//!   Encryption is therefore deterministic for identical payloads.
//! - The vault never stores or returns a blind-index digest; only
//!   recoverable plaintext-equivalent data crosses this boundary.
//!
//! ## Boundary
//!
//! Other services reach the vault only through the [`VaultClient`]
//! trait. [`LocalVaultClient`] is the in-process implementation; the
//! call contract (no internal retry, `Unavailable` is fatal to the
//! enclosing operation) holds for any implementation.

pub mod blob;
pub mod client;
pub mod crypto;
pub mod error;
pub mod secrets;
pub mod service;

pub use blob::{BlobStore, MemoryBlobStore, SqliteBlobStore};
pub use client::{LocalVaultClient, VaultClient, VaultClientError};
pub use crypto::{VaultKey, VaultNonce};
pub use error::{Result, VaultError};
pub use secrets::{EnvSecretStore, SecretError, SecretStore, Secrets};
pub use service::Vault;
