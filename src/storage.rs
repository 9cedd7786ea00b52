//! Key-value metadata store for persisted index blobs.
//!
//! The engine persists each corpus's serialized index under a corpus-specific
//! key. [`MetadataStore`] is the seam the persistence collaborator implements;
//! [`SqliteMetadataStore`] is the bundled implementation (a single `kv`
//! table), and [`InMemoryMetadataStore`] backs tests.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

/// Opaque blob storage keyed by string.
pub trait MetadataStore: Send {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn put(&mut self, key: &str, value: &[u8]) -> Result<()>;
    fn delete(&mut self, key: &str) -> Result<()>;
}

/// SQLite-backed key-value store.
pub struct SqliteMetadataStore {
    conn: Connection,
}

impl SqliteMetadataStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("failed to open metadata store at {}", path.as_ref().display()))?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory store, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory store")?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value BLOB NOT NULL
            );",
        )
        .context("failed to initialize kv schema")?;
        Ok(())
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()
            .context("kv read failed")?;
        Ok(value)
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .context("kv write failed")?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .context("kv delete failed")?;
        Ok(())
    }
}

/// HashMap-backed store for tests and ephemeral use.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    entries: HashMap<String, Vec<u8>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_put_get_round_trip() {
        let mut store = SqliteMetadataStore::open_in_memory().unwrap();
        store.put("bm25:code", b"payload").unwrap();
        assert_eq!(store.get("bm25:code").unwrap().as_deref(), Some(&b"payload"[..]));
    }

    #[test]
    fn test_sqlite_put_overwrites() {
        let mut store = SqliteMetadataStore::open_in_memory().unwrap();
        store.put("k", b"one").unwrap();
        store.put("k", b"two").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some(&b"two"[..]));
    }

    #[test]
    fn test_sqlite_delete_and_missing_key() {
        let mut store = SqliteMetadataStore::open_in_memory().unwrap();
        assert!(store.get("absent").unwrap().is_none());
        store.put("k", b"v").unwrap();
        store.delete("k").unwrap();
        assert!(store.get("k").unwrap().is_none());
        // Deleting a missing key is not an error.
        store.delete("k").unwrap();
    }

    #[test]
    fn test_sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.db");
        {
            let mut store = SqliteMetadataStore::open(&path).unwrap();
            store.put("k", b"durable").unwrap();
        }
        let store = SqliteMetadataStore::open(&path).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some(&b"durable"[..]));
    }

    #[test]
    fn test_in_memory_store() {
        let mut store = InMemoryMetadataStore::new();
        store.put("a", b"1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some(&b"1"[..]));
        store.delete("a").unwrap();
        assert!(store.get("a").unwrap().is_none());
    }
}
