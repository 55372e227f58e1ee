//! # Veil Store
//!
//! Storage abstraction and SQLite implementation for the Veil platform.
//!
//! The store holds three families of durable state, all keyed by
//! principal id:
//!
//! - the credential table (credential digest, raw scope list, class)
//! - the role table (role name to scope list)
//! - one hashed-PII table per owning level, one column per catalog field,
//!   holding blind-index digests or native numeric/boolean values -
//!   never plaintext strings
//!
//! Encrypted recoverable data is NOT stored here; that is the vault's
//! storage, behind a separate service boundary.
//!
//! The [`Store`] trait keeps the engine storage-agnostic. [`SqliteStore`]
//! is the primary backend; [`MemoryStore`] is the in-memory twin used by
//! tests.

pub mod error;
pub mod memory;
pub mod migration;
pub mod records;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use records::{LevelRow, OnboardingBatch, PrincipalRecord, RoleRecord};
pub use sqlite::SqliteStore;
pub use traits::Store;
