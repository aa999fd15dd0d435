use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use super::{KeyValueStorage, StorageError, DEFAULT_QUOTA_BYTES};

/// Durable key-value store backed by a single SQLite table.
///
/// It plays the role of the browser's local storage for the CLI: one
/// row per slot, and a byte quota across all rows so the history
/// gallery sees the same capacity failures it would in a browser.
pub struct SqliteStorage {
    conn: Connection,
    db_path: Option<PathBuf>,
    quota: usize,
}

impl SqliteStorage {
    /// Open (or create) the store at `path`.
    ///
    /// The default location comes from `default_db_path`:
    /// - Linux: ~/.local/share/photo-remix/storage.db
    /// - macOS: ~/Library/Application Support/photo-remix/storage.db
    /// - Windows: %APPDATA%\photo-remix\storage.db
    pub fn open(path: &Path, quota: usize) -> Result<Self, StorageError> {
        // Ensure the parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "opened storage database");

        let mut storage = SqliteStorage {
            conn,
            db_path: Some(path.to_path_buf()),
            quota,
        };
        storage.init_schema()?;

        Ok(storage)
    }

    /// Open a throwaway in-memory store (tests, dry runs)
    pub fn open_in_memory(quota: usize) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let mut storage = SqliteStorage {
            conn,
            db_path: None,
            quota,
        };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Get the path where the database is stored by default
    pub fn default_db_path() -> Option<PathBuf> {
        let mut path = dirs::data_dir().or_else(dirs::home_dir)?;
        path.push("photo-remix");
        path.push("storage.db");
        Some(path)
    }

    /// Open the store at its default location with the default quota
    pub fn open_default() -> Result<Self, StorageError> {
        let path = Self::default_db_path().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine user data directory",
            )
        })?;
        Self::open(&path, DEFAULT_QUOTA_BYTES)
    }

    /// Create the slot table if it doesn't exist
    fn init_schema(&mut self) -> Result<(), StorageError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key         TEXT PRIMARY KEY NOT NULL,
                value       TEXT NOT NULL,
                updated_at  INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Path of the database file (`None` for in-memory stores)
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Byte quota enforced across all slots
    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Total bytes stored in slots other than `key`
    fn used_bytes_excluding(&self, key: &str) -> Result<usize, StorageError> {
        let used: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(value AS BLOB))), 0) FROM kv WHERE key != ?1",
            params![key],
            |row| row.get(0),
        )?;
        Ok(used.max(0) as usize)
    }
}

impl KeyValueStorage for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let needed = self.used_bytes_excluding(key)? + value.len();
        if needed > self.quota {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                needed,
                quota: self.quota,
            });
        }

        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE
             SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("db_path", &self.db_path)
            .field("quota", &self.quota)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_replace() {
        let mut storage = SqliteStorage::open_in_memory(1024).unwrap();
        assert_eq!(storage.get("history").unwrap(), None);

        storage.set("history", "[]").unwrap();
        storage.set("history", "[1]").unwrap();
        assert_eq!(storage.get("history").unwrap().as_deref(), Some("[1]"));

        storage.remove("history").unwrap();
        assert_eq!(storage.get("history").unwrap(), None);
    }

    #[test]
    fn test_quota_counts_other_slots() {
        let mut storage = SqliteStorage::open_in_memory(8).unwrap();
        storage.set("a", "aaaa").unwrap();
        storage.set("b", "bbbb").unwrap();

        let err = storage.set("b", "bbbbb").unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(storage.get("b").unwrap().as_deref(), Some("bbbb"));

        // Shrinking a slot always fits
        storage.set("a", "a").unwrap();
        storage.set("b", "bbbbbbb").unwrap();
    }

    #[test]
    fn test_open_on_disk_persists() {
        let dir = std::env::temp_dir().join(format!("photo-remix-test-{}", uuid::Uuid::now_v7()));
        let path = dir.join("storage.db");

        {
            let mut storage = SqliteStorage::open(&path, 1024).unwrap();
            storage.set("k", "v").unwrap();
            assert_eq!(storage.path(), Some(path.as_path()));
        }

        let storage = SqliteStorage::open(&path, 1024).unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
