//! Key-value storage substrate.
//!
//! Plays the role browser local storage plays for the web client: string
//! keys, string values, whole-value overwrite, and an optional quota.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use super::{open_database, open_memory_database, DatabaseError};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Storage quota exceeded: {size} bytes (limit {limit})")]
    QuotaExceeded { size: usize, limit: usize },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(e))
    }
}

/// Minimal string key-value store.
pub trait KeyValueStorage: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrite the value stored under `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

fn check_quota(limit: Option<usize>, value: &str) -> Result<(), StorageError> {
    match limit {
        Some(limit) if value.len() > limit => Err(StorageError::QuotaExceeded {
            size: value.len(),
            limit,
        }),
        _ => Ok(()),
    }
}

// ═══════════════════════════════════════════
// SQLite
// ═══════════════════════════════════════════

/// SQLite-backed key-value storage (one `kv_store` table).
pub struct SqliteKvStorage {
    conn: Connection,
    max_value_bytes: Option<usize>,
}

impl SqliteKvStorage {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = open_database(path)?;
        tracing::debug!(path = %path.display(), "Opened key-value storage");
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Ok(Self::from_connection(open_memory_database()?))
    }

    /// Wrap a connection that has already been migrated.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            max_value_bytes: None,
        }
    }

    /// Reject values larger than `limit` bytes.
    pub fn with_quota(mut self, limit: usize) -> Self {
        self.max_value_bytes = Some(limit);
        self
    }
}

impl KeyValueStorage for SqliteKvStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        check_quota(self.max_value_bytes, value)?;
        let now = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }
}

// ═══════════════════════════════════════════
// In-memory
// ═══════════════════════════════════════════

#[derive(Default)]
struct MemoryInner {
    entries: HashMap<String, String>,
    fail_writes: bool,
    max_value_bytes: Option<usize>,
}

/// In-memory storage. Clones share the same entries, so a test can keep a
/// handle after giving one to the store.
#[derive(Clone, Default)]
pub struct MemoryKvStorage {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryKvStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(self, limit: usize) -> Self {
        self.lock().max_value_bytes = Some(limit);
        self
    }

    /// Make every subsequent `set`/`remove` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Store a raw value, bypassing quota and failure switches.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.lock().entries.insert(key.to_string(), value.to_string());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStorage for MemoryKvStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(StorageError::Unavailable("writes disabled".into()));
        }
        check_quota(inner.max_value_bytes, value)?;
        inner.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(StorageError::Unavailable("writes disabled".into()));
        }
        inner.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(storage: &dyn KeyValueStorage) {
        assert_eq!(storage.get("k").unwrap(), None);

        storage.set("k", "v1").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v1"));

        storage.set("k", "v2").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v2"));

        storage.remove("k").unwrap();
        assert_eq!(storage.get("k").unwrap(), None);

        // Removing again is fine
        storage.remove("k").unwrap();
    }

    #[test]
    fn sqlite_get_set_remove() {
        let storage = SqliteKvStorage::open_in_memory().unwrap();
        exercise(&storage);
    }

    #[test]
    fn memory_get_set_remove() {
        let storage = MemoryKvStorage::new();
        exercise(&storage);
    }

    #[test]
    fn sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.db");

        {
            let storage = SqliteKvStorage::open(&path).unwrap();
            storage.set("history", "[1,2,3]").unwrap();
        }

        let reopened = SqliteKvStorage::open(&path).unwrap();
        assert_eq!(reopened.get("history").unwrap().as_deref(), Some("[1,2,3]"));
    }

    #[test]
    fn sqlite_quota_rejects_large_values() {
        let storage = SqliteKvStorage::open_in_memory().unwrap().with_quota(8);
        storage.set("k", "short").unwrap();
        let err = storage.set("k", "this is far too long").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { limit: 8, .. }));
        // Previous value survives
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("short"));
    }

    #[test]
    fn memory_clones_share_entries() {
        let a = MemoryKvStorage::new();
        let b = a.clone();
        a.set("k", "v").unwrap();
        assert_eq!(b.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn memory_failing_writes() {
        let storage = MemoryKvStorage::new();
        storage.set("k", "v").unwrap();
        storage.set_fail_writes(true);
        assert!(matches!(storage.set("k", "w"), Err(StorageError::Unavailable(_))));
        assert!(storage.remove("k").is_err());
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));

        storage.set_fail_writes(false);
        storage.set("k", "w").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("w"));
    }

    #[test]
    fn traits_are_object_safe() {
        fn _assert_storage(_: &dyn KeyValueStorage) {}
    }
}
