//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via `tokio::spawn_blocking`. SQL against the
//! hashed-PII tables is generated from the field catalog; every column
//! name is a catalog member, never caller input.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};

use veil_core::{FieldCatalog, PredicateGroup, PrincipalClass, PrincipalId, StoredValue};

use crate::error::{Result, StoreError};
use crate::migration::{self, pii_table};
use crate::records::{OnboardingBatch, PrincipalRecord, RoleRecord};
use crate::traits::Store;

/// SQLite-based store implementation.
///
/// Thread-safe via an internal Mutex. All operations run on the blocking
/// pool to keep the async runtime responsive.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    catalog: Arc<FieldCatalog>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>, catalog: Arc<FieldCatalog>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn, &catalog)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            catalog,
        })
    }

    /// Open an in-memory SQLite database. Useful for testing.
    pub fn open_memory(catalog: Arc<FieldCatalog>) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn, &catalog)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            catalog,
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection, &FieldCatalog) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let catalog = Arc::clone(&self.catalog);

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Runtime(format!("mutex poisoned: {}", e)))?;
            f(&mut *conn, &catalog)
        })
        .await
        .map_err(|e| StoreError::Runtime(format!("spawn_blocking failed: {}", e)))?
    }
}

/// Encode a scope list as a CBOR blob.
fn encode_scopes(scopes: &[String]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(&scopes, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Decode a scope list from its CBOR blob.
fn decode_scopes(bytes: &[u8]) -> Result<Vec<String>> {
    ciborium::from_reader(bytes).map_err(|e: ciborium::de::Error<std::io::Error>| {
        StoreError::Serialization(e.to_string())
    })
}

/// Convert a stored representation into an owned SQLite value.
fn sql_value(value: &StoredValue) -> SqlValue {
    match value {
        StoredValue::Digest(hex) => SqlValue::Text(hex.clone()),
        StoredValue::Number(n) => SqlValue::Real(*n),
        StoredValue::Bool(b) => SqlValue::Integer(*b as i64),
    }
}

fn row_to_principal(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, Vec<u8>, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_principal(&self, id: &PrincipalId) -> Result<Option<PrincipalRecord>> {
        let id = id.clone();

        self.run(move |conn, _| {
            let row = conn
                .query_row(
                    "SELECT principal_id, credential_digest, scopes, class
                     FROM principals WHERE principal_id = ?1",
                    params![id.as_str()],
                    row_to_principal,
                )
                .optional()?;

            let Some((principal_id, credential_digest, scopes_cbor, class)) = row else {
                return Ok(None);
            };

            Ok(Some(PrincipalRecord {
                id: PrincipalId::new(principal_id),
                credential_digest,
                scopes: decode_scopes(&scopes_cbor)?,
                class: class
                    .parse::<PrincipalClass>()
                    .map_err(StoreError::InvalidData)?,
            }))
        })
        .await
    }

    async fn principal_exists(&self, id: &PrincipalId) -> Result<bool> {
        let id = id.clone();

        self.run(move |conn, _| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM principals WHERE principal_id = ?1)",
                params![id.as_str()],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
        .await
    }

    async fn assign_scopes(&self, id: &PrincipalId, scopes: Vec<String>) -> Result<()> {
        let id = id.clone();

        self.run(move |conn, _| {
            let updated = conn.execute(
                "UPDATE principals SET scopes = ?2 WHERE principal_id = ?1",
                params![id.as_str(), encode_scopes(&scopes)?],
            )?;

            if updated == 0 {
                return Err(StoreError::PrincipalNotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn get_roles(&self, names: &[String]) -> Result<Vec<RoleRecord>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let names = names.to_vec();

        self.run(move |conn, _| {
            let placeholders = (1..=names.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");

            let mut stmt = conn.prepare(&format!(
                "SELECT role_name, scopes FROM roles WHERE role_name IN ({})",
                placeholders
            ))?;

            let roles = stmt
                .query_map(rusqlite::params_from_iter(names.iter()), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            roles
                .into_iter()
                .map(|(name, scopes_cbor)| {
                    Ok(RoleRecord {
                        name,
                        scopes: decode_scopes(&scopes_cbor)?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn upsert_role(&self, role: &RoleRecord) -> Result<()> {
        let role = role.clone();

        self.run(move |conn, _| {
            conn.execute(
                "INSERT INTO roles (role_name, scopes) VALUES (?1, ?2)
                 ON CONFLICT(role_name) DO UPDATE SET scopes = excluded.scopes",
                params![role.name, encode_scopes(&role.scopes)?],
            )?;
            Ok(())
        })
        .await
    }

    async fn lookup_ids(&self, group: &PredicateGroup) -> Result<BTreeSet<PrincipalId>> {
        let group = group.clone();

        self.run(move |conn, catalog| {
            let mut clauses = Vec::new();
            let mut bindings: Vec<SqlValue> = Vec::new();

            for predicate in &group.predicates {
                // Column names must come from the catalog; anything else
                // never reaches the SQL text.
                if !catalog.contains(&predicate.field) {
                    return Err(StoreError::InvalidData(format!(
                        "predicate on unknown field: {}",
                        predicate.field
                    )));
                }

                let placeholders = predicate
                    .values
                    .iter()
                    .map(|value| {
                        bindings.push(sql_value(value));
                        format!("?{}", bindings.len())
                    })
                    .collect::<Vec<_>>()
                    .join(", ");

                if predicate.values.len() == 1 {
                    clauses.push(format!("{} = {}", predicate.field, placeholders));
                } else {
                    clauses.push(format!("{} IN ({})", predicate.field, placeholders));
                }
            }

            if clauses.is_empty() {
                return Ok(BTreeSet::new());
            }

            let mut stmt = conn.prepare(&format!(
                "SELECT principal_id FROM {} WHERE {}",
                pii_table(group.level),
                clauses.join(" AND ")
            ))?;

            let ids = stmt
                .query_map(rusqlite::params_from_iter(bindings), |row| {
                    row.get::<_, String>(0).map(PrincipalId::new)
                })?
                .collect::<rusqlite::Result<BTreeSet<_>>>()?;

            Ok(ids)
        })
        .await
    }

    async fn pii_row_exists(&self, id: &PrincipalId) -> Result<bool> {
        let id = id.clone();

        self.run(move |conn, catalog| {
            for level in catalog.levels() {
                let exists: bool = conn.query_row(
                    &format!(
                        "SELECT EXISTS(SELECT 1 FROM {} WHERE principal_id = ?1)",
                        pii_table(level)
                    ),
                    params![id.as_str()],
                    |row| row.get(0),
                )?;
                if exists {
                    return Ok(true);
                }
            }
            Ok(false)
        })
        .await
    }

    async fn apply_onboarding(&self, batch: &OnboardingBatch) -> Result<()> {
        let batch = batch.clone();

        self.run(move |conn, catalog| {
            let id = batch.principal.id.clone();
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO principals (principal_id, credential_digest, scopes, class)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    batch.principal.id.as_str(),
                    batch.principal.credential_digest,
                    encode_scopes(&batch.principal.scopes)?,
                    batch.principal.class.as_str(),
                ],
            )
            .map_err(|e| map_constraint(e, &id))?;

            for row in &batch.rows {
                let mut columns = vec!["principal_id".to_string()];
                let mut bindings: Vec<SqlValue> =
                    vec![SqlValue::Text(batch.principal.id.as_str().to_string())];

                for (field, value) in &row.fields {
                    if !catalog.contains(field) {
                        return Err(StoreError::InvalidData(format!(
                            "staged row references unknown field: {}",
                            field
                        )));
                    }
                    columns.push(field.clone());
                    bindings.push(sql_value(value));
                }

                let placeholders = (1..=bindings.len())
                    .map(|i| format!("?{}", i))
                    .collect::<Vec<_>>()
                    .join(", ");

                tx.execute(
                    &format!(
                        "INSERT INTO {} ({}) VALUES ({})",
                        pii_table(row.level),
                        columns.join(", "),
                        placeholders
                    ),
                    rusqlite::params_from_iter(bindings),
                )
                .map_err(|e| map_constraint(e, &id))?;
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }
}

/// Translate a primary-key violation into the id-reservation race signal.
fn map_constraint(e: rusqlite::Error, id: &PrincipalId) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::IdCollision(id.clone())
        }
        _ => StoreError::Database(e),
    }
}
