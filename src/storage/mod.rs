//! Key-value persistence layer
//!
//! The history gallery only needs a tiny contract from its storage:
//! read a slot, write a slot, drop a slot, and report when a write
//! does not fit. Two backends are provided:
//! - `MemoryStorage` - in-process map with an optional byte quota
//! - `SqliteStorage` - durable single-table store (sqlite.rs)

pub mod sqlite;

use std::collections::HashMap;

pub use sqlite::SqliteStorage;

/// Default storage quota in bytes (5 MiB, the usual browser local storage limit)
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Errors reported by a key-value backend
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The write was rejected because the store is out of capacity
    #[error(
        "storage quota exceeded writing '{key}': {needed} bytes needed, quota is {quota} bytes"
    )]
    QuotaExceeded {
        key: String,
        needed: usize,
        quota: usize,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize value: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StorageError {
    /// Whether this error is a capacity failure (the only one worth shrinking and retrying)
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

/// Minimal synchronous key-value contract
pub trait KeyValueStorage {
    /// Read the value stored under `key`, `None` when the slot is empty
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` under `key`, replacing any previous value
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Drop the slot; removing a missing key is not an error
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// In-memory storage, optionally bounded by a total byte quota
///
/// The quota counts the bytes of every stored value, like a browser's
/// per-origin storage limit. Replacing a value only counts the new size.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    slots: HashMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStorage {
    /// Create an unbounded in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an in-memory store that rejects writes past `quota` bytes
    pub fn with_quota(quota: usize) -> Self {
        Self {
            slots: HashMap::new(),
            quota: Some(quota),
        }
    }

    /// Total bytes currently stored
    pub fn used_bytes(&self) -> usize {
        self.slots.values().map(String::len).sum()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota {
            let others: usize = self
                .slots
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            let needed = others + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    quota,
                });
            }
        }

        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.slots.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_roundtrip() {
        let mut storage = MemoryStorage::new();
        assert_eq!(storage.get("a").unwrap(), None);

        storage.set("a", "hello").unwrap();
        assert_eq!(storage.get("a").unwrap().as_deref(), Some("hello"));

        storage.remove("a").unwrap();
        assert_eq!(storage.get("a").unwrap(), None);

        // Removing again is fine
        storage.remove("a").unwrap();
    }

    #[test]
    fn test_memory_quota() {
        let mut storage = MemoryStorage::with_quota(10);
        storage.set("a", "12345").unwrap();

        // Replacing the same key only counts the new value
        storage.set("a", "1234567890").unwrap();

        let err = storage.set("b", "x").unwrap_err();
        assert!(err.is_quota_exceeded());

        // The rejected write left the store untouched
        assert_eq!(storage.get("b").unwrap(), None);
        assert_eq!(storage.used_bytes(), 10);
    }
}
