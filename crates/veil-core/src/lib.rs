//! # Veil Core
//!
//! Pure primitives for the Veil platform: the field catalog, the scope
//! grammar, blind-index tokenization, and canonical payload encoding.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over the data model shared by every other crate.
//!
//! ## Key Types
//!
//! - [`FieldCatalog`] - Static classification of every PII attribute
//! - [`Level`] - The owning entity a field belongs to
//! - [`Scope`] / [`ScopeSet`] - Permission atoms and the wildcard matcher
//! - [`Tokenizer`] - The swappable blind-index strategy for equality search
//! - [`QueryPlan`] - Typed per-level predicate groups built from a request
//!
//! ## Canonicalization
//!
//! Recoverable field maps are encoded as deterministic CBOR before
//! encryption. See [`canonical`].

pub mod canonical;
pub mod catalog;
pub mod error;
pub mod plan;
pub mod scope;
pub mod token;
pub mod types;
pub mod value;

pub use canonical::{decode_fields, encode_fields};
pub use catalog::{FieldCatalog, FieldDef, Level};
pub use error::{CoreError, Result};
pub use plan::{Combinator, PredicateGroup, QueryPlan, TokenizedPredicate};
pub use scope::{partition_grants, Scope, ScopeSet};
pub use token::{BlindIndexTokenizer, IndexSalt, Tokenizer};
pub use types::{PrincipalClass, PrincipalId};
pub use value::{FieldValue, StoredValue, ValueType};
