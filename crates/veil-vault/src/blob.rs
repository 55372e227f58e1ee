//! Encrypted blob persistence, keyed by (principal id, level).
//!
//! The vault has its own storage, separate from the hash-index database;
//! nothing here ever sees a blind-index digest or a plaintext field.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use veil_core::{Level, PrincipalId};

use crate::error::{Result, VaultError};

/// Persistence interface for encrypted level blobs.
///
/// Invariant: at most one blob per (principal, level); an upsert
/// replaces the previous blob wholesale.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write one blob per level for a principal, atomically.
    async fn upsert_blobs(&self, principal: &PrincipalId, blobs: Vec<(Level, Vec<u8>)>)
        -> Result<()>;

    /// Fetch the blob for a (principal, level) pair, if any.
    async fn get_blob(&self, principal: &PrincipalId, level: Level) -> Result<Option<Vec<u8>>>;
}

/// SQLite-backed blob store.
pub struct SqliteBlobStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBlobStore {
    /// Open the vault database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory vault database. Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS encrypted_blobs (
                principal_id TEXT NOT NULL,
                level TEXT NOT NULL,
                ciphertext BLOB NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (principal_id, level)
            );
            "#,
        )?;
        Ok(())
    }

    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| VaultError::Runtime(format!("mutex poisoned: {}", e)))?;
            f(&mut *conn)
        })
        .await
        .map_err(|e| VaultError::Runtime(format!("spawn_blocking failed: {}", e)))?
    }
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    async fn upsert_blobs(
        &self,
        principal: &PrincipalId,
        blobs: Vec<(Level, Vec<u8>)>,
    ) -> Result<()> {
        let principal = principal.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let now = now_millis();

            for (level, ciphertext) in &blobs {
                tx.execute(
                    "INSERT INTO encrypted_blobs (principal_id, level, ciphertext, updated_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(principal_id, level) DO UPDATE SET
                        ciphertext = excluded.ciphertext,
                        updated_at = excluded.updated_at",
                    params![principal.as_str(), level.as_str(), ciphertext, now],
                )?;
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_blob(&self, principal: &PrincipalId, level: Level) -> Result<Option<Vec<u8>>> {
        let principal = principal.clone();

        self.run(move |conn| {
            conn.query_row(
                "SELECT ciphertext FROM encrypted_blobs
                 WHERE principal_id = ?1 AND level = ?2",
                params![principal.as_str(), level.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(VaultError::from)
        })
        .await
    }
}

/// In-memory blob store for tests.
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<(PrincipalId, Level), Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Create a new empty in-memory blob store.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upsert_blobs(
        &self,
        principal: &PrincipalId,
        blobs: Vec<(Level, Vec<u8>)>,
    ) -> Result<()> {
        let mut map = self.blobs.write().unwrap();
        for (level, ciphertext) in blobs {
            map.insert((principal.clone(), level), ciphertext);
        }
        Ok(())
    }

    async fn get_blob(&self, principal: &PrincipalId, level: Level) -> Result<Option<Vec<u8>>> {
        let map = self.blobs.read().unwrap();
        Ok(map.get(&(principal.clone(), level)).cloned())
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
