//! Persistent key-value storage.
//!
//! A string-keyed, string-valued synchronous store with capacity limits. The
//! response cache uses it as its durable tier, so every operation may fail and
//! callers are expected to degrade rather than abort.

use crate::db::Database;
use anyhow::Result;
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::debug;

/// Errors raised by a persistent store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Writing would exceed the store's capacity
    #[error("storage quota exceeded: {used} of {capacity} bytes in use")]
    QuotaExceeded { used: usize, capacity: usize },

    /// The backing store cannot be reached
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// SQLite reported an error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Synchronous string key-value store
pub trait KeyValueStore: Send + Sync {
    /// Name used in log lines
    fn name(&self) -> &'static str;

    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Insert or replace the value stored under `key`
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete `key` (deleting a missing key is not an error)
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// List every stored key
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-process store with an optional byte budget
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    capacity_bytes: Option<usize>,
}

impl MemoryStore {
    /// Create an unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects writes beyond `capacity_bytes` of keys and values
    pub fn with_capacity(capacity_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity_bytes: Some(capacity_bytes),
        }
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = lock(&self.entries);

        if let Some(capacity) = self.capacity_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > capacity {
                return Err(StoreError::QuotaExceeded { used, capacity });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.entries).remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(lock(&self.entries).keys().cloned().collect())
    }
}

/// Store backed by the `kv_store` table
pub struct SqliteStore {
    db: Mutex<Database>,
}

impl SqliteStore {
    /// Wrap an open database
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open (or create) the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }
}

impl KeyValueStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let db = lock(&self.db);
        let value = db
            .conn()
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let db = lock(&self.db);
        db.conn().execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
            params![key, value],
        )?;
        debug!(key = key, bytes = value.len(), "Stored value");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let db = lock(&self.db);
        db.conn()
            .execute("DELETE FROM kv_store WHERE key = ?1", [key])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let db = lock(&self.db);
        let mut stmt = db.conn().prepare("SELECT key FROM kv_store ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_roundtrip() -> Result<()> {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing")?, None);

        store.set("a", "1")?;
        store.set("a", "2")?;
        assert_eq!(store.get("a")?, Some("2".to_string()));
        assert_eq!(store.len(), 1);

        store.remove("a")?;
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn test_memory_store_quota() -> Result<()> {
        let store = MemoryStore::with_capacity(10);
        store.set("key", "val")?;

        let err = store.set("other", "too long").unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { .. }));

        // Replacing an existing key only counts the new value
        store.set("key", "value12")?;
        assert_eq!(store.get("key")?, Some("value12".to_string()));
        Ok(())
    }

    #[test]
    fn test_sqlite_store() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = SqliteStore::open(temp_dir.path().join("cache.db"))?;

        store.set("cache_b", "{}")?;
        store.set("cache_a", "[]")?;
        store.set("cache_a", "[1]")?;

        assert_eq!(store.get("cache_a")?, Some("[1]".to_string()));
        assert_eq!(store.keys()?, vec!["cache_a".to_string(), "cache_b".to_string()]);

        store.remove("cache_a")?;
        store.remove("never_stored")?;
        assert_eq!(store.get("cache_a")?, None);
        Ok(())
    }

    #[test]
    fn test_sqlite_store_survives_reopen() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("cache.db");

        SqliteStore::open(&path)?.set("k", "v")?;
        let reopened = SqliteStore::open(&path)?;
        assert_eq!(reopened.get("k")?, Some("v".to_string()));
        Ok(())
    }
}
