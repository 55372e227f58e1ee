//! Database schema migrations for SQLite.
//!
//! A simple versioned migration system: each migration transforms the
//! schema from version N to N+1. The hashed-PII tables are generated
//! from the field catalog, one table per level with one column per
//! field, so the schema always mirrors the static registry the process
//! was built with.

use rusqlite::Connection;
use veil_core::{FieldCatalog, Level, ValueType};

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Name of the hashed-PII table for a level.
pub fn pii_table(level: Level) -> String {
    format!("pii_{}", level.as_str())
}

/// Initialize or migrate the database schema.
///
/// Idempotent - safe to call multiple times.
pub fn migrate(conn: &mut Connection, catalog: &FieldCatalog) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            tracing::debug!(version, "applying schema migration");
            apply_migration(&tx, version, catalog)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32, catalog: &FieldCatalog) -> Result<()> {
    match version {
        1 => apply_v1(conn, catalog),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: credential table, role table, and one hashed-PII table
/// per catalog level.
fn apply_v1(conn: &Connection, catalog: &FieldCatalog) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Credential table: one row per principal
        CREATE TABLE principals (
            principal_id TEXT PRIMARY KEY,     -- 10-digit numeric string
            credential_digest TEXT NOT NULL,   -- blind-index digest, never plaintext
            scopes BLOB NOT NULL,              -- CBOR array of grant strings
            class TEXT NOT NULL                -- CUSTOMER | SERVICE
        );

        -- Role table: named scope bundles
        CREATE TABLE roles (
            role_name TEXT PRIMARY KEY,
            scopes BLOB NOT NULL               -- CBOR array of scope strings
        );
        "#,
    )?;

    for level in catalog.levels() {
        let mut columns = vec!["principal_id TEXT PRIMARY KEY".to_string()];
        for field in catalog.fields_of(level) {
            if let Some(def) = catalog.lookup(field) {
                columns.push(format!("{} {}", field, column_type(def.value_type)));
            }
        }

        conn.execute(
            &format!("CREATE TABLE {} ({})", pii_table(level), columns.join(", ")),
            [],
        )?;
    }

    // The natural key is the one hashed column queried on every
    // onboarding, so it gets an index.
    let natural = catalog.natural_key();
    if let Some(def) = catalog.lookup(natural) {
        conn.execute(
            &format!(
                "CREATE INDEX idx_{table}_{natural} ON {table}({natural})",
                table = pii_table(def.level),
            ),
            [],
        )?;
    }

    Ok(())
}

/// SQLite column type for a stored representation.
fn column_type(value_type: ValueType) -> &'static str {
    match value_type {
        // Digest columns hold hex strings.
        ValueType::String | ValueType::Date => "TEXT",
        ValueType::Number => "REAL",
        ValueType::Boolean => "INTEGER",
    }
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        let catalog = FieldCatalog::builtin();
        migrate(&mut conn, &catalog).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"principals".to_string()));
        assert!(tables.contains(&"roles".to_string()));
        assert!(tables.contains(&"pii_identity".to_string()));
        assert!(tables.contains(&"pii_residence".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_pii_tables_have_one_column_per_field() {
        let mut conn = Connection::open_in_memory().unwrap();
        let catalog = FieldCatalog::builtin();
        migrate(&mut conn, &catalog).unwrap();

        let columns: Vec<String> = conn
            .prepare("SELECT name FROM pragma_table_info('pii_identity')")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(columns.contains(&"principal_id".to_string()));
        for field in catalog.fields_of(Level::Identity) {
            assert!(columns.contains(&field.to_string()), "missing {field}");
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        let catalog = FieldCatalog::builtin();
        migrate(&mut conn, &catalog).unwrap();
        migrate(&mut conn, &catalog).unwrap();
        migrate(&mut conn, &catalog).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }
}
