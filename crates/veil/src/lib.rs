//! # Veil
//!
//! The unified engine for the Veil platform: PII split between a
//! searchable, irreversible representation and a recoverable, encrypted
//! one, with a scope/role permission model gating every read down to
//! field granularity.
//!
//! ## Overview
//!
//! - **Hash index**: every string-typed PII value is stored as a
//!   deterministic blind-index digest, so equality search works without
//!   recoverability.
//! - **Vault**: the recoverable plaintext lives behind a separate
//!   service boundary, encrypted per (principal, level).
//! - **Scopes**: `entity:action:field` atoms with wildcard
//!   generalization; roles bundle scopes and expand one level deep.
//! - **Search**: query/count/sum/avg over field predicates, authorized
//!   per field, planned per owning entity, merged deterministically.
//! - **Onboarding**: tokenize locally, encrypt remotely, commit local
//!   rows only after the vault call succeeds.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use veil::{Engine, EngineConfig};
//! use veil::core::{BlindIndexTokenizer, FieldCatalog};
//! use veil::store::SqliteStore;
//! use veil::vault::{
//!     EnvSecretStore, LocalVaultClient, SecretStore, SqliteBlobStore, Vault,
//! };
//!
//! fn build() -> anyhow::Result<()> {
//!     // Resolve secrets once; fail fast before serving.
//!     let secrets = EnvSecretStore.load()?;
//!     let catalog = Arc::new(FieldCatalog::builtin());
//!     let tokenizer = Arc::new(BlindIndexTokenizer::new(&secrets.index_salt));
//!
//!     let store = SqliteStore::open("veil.db", Arc::clone(&catalog))?;
//!     let vault = Vault::new(
//!         Arc::clone(&catalog),
//!         secrets.vault_key.clone(),
//!         secrets.vault_nonce.clone(),
//!         SqliteBlobStore::open("vault.db")?,
//!     );
//!     let client = LocalVaultClient::new(Arc::new(vault));
//!
//!     let _engine = Engine::new(catalog, tokenizer, store, client, EngineConfig::default());
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;
pub mod ingest;
pub mod request;
pub mod resolver;

pub use engine::{Engine, EngineConfig};
pub use error::{
    AggregateFieldError, DeniedField, EngineError, ErrorClass, Result,
};
pub use request::{
    FieldPredicate, OnboardRequest, OnboardResponse, Operation, PredicateValues, RecordView,
    SearchBody, SearchRequest, SearchResponse, SearchResults,
};
pub use resolver::resolve_scopes;

// Convenience access to the underlying crates.
pub use veil_core as core;
pub use veil_store as store;
pub use veil_vault as vault;
