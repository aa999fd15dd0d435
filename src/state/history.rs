use serde_json::Value;

use super::data::PhotoRecord;
use crate::storage::{KeyValueStorage, StorageError};

/// Storage key of the history slot
pub const DEFAULT_STORAGE_KEY: &str = "photo-remix.history";

/// Maximum number of records kept in the gallery
pub const DEFAULT_MAX_HISTORY_SIZE: usize = 20;

/// Size the gallery is cut down to when a write hits the storage quota
pub const DEFAULT_DEGRADE_FLOOR: usize = 10;

/// Limits and location of a history slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    pub storage_key: String,
    pub max_history_size: usize,
    pub degrade_floor: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            max_history_size: DEFAULT_MAX_HISTORY_SIZE,
            degrade_floor: DEFAULT_DEGRADE_FLOOR,
        }
    }
}

/// How a successful save was persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The full (bounded) list was written
    Stored { kept: usize },
    /// The first write hit the quota; a shrunken list was written instead
    Degraded { kept: usize },
}

impl SaveOutcome {
    /// Number of records now persisted
    pub fn kept(&self) -> usize {
        match self {
            SaveOutcome::Stored { kept } | SaveOutcome::Degraded { kept } => *kept,
        }
    }
}

/// The HistoryStore keeps a bounded, newest-first gallery of photo
/// records in one slot of a key-value store.
///
/// History is best-effort: reads never fail (a bad slot reads as an
/// empty gallery) and writes that hit the quota shrink the gallery
/// once before giving up.
pub struct HistoryStore<S: KeyValueStorage> {
    storage: S,
    config: HistoryConfig,
}

impl<S: KeyValueStorage> HistoryStore<S> {
    pub fn new(storage: S, config: HistoryConfig) -> Self {
        // The floor must sit between 1 and the max for the retry to make sense
        let max = config.max_history_size.max(1);
        let config = HistoryConfig {
            max_history_size: max,
            degrade_floor: config.degrade_floor.clamp(1, max),
            ..config
        };
        Self { storage, config }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn storage_key(&self) -> &str {
        &self.config.storage_key
    }

    /// Access the underlying storage
    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Read the persisted gallery, newest first.
    ///
    /// Missing or unreadable data yields an empty list. Elements that do
    /// not decode as records are skipped.
    pub fn load(&self) -> Vec<PhotoRecord> {
        match self.read_records() {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(
                    key = %self.config.storage_key,
                    error = %e,
                    "failed to read history, treating as empty"
                );
                Vec::new()
            }
        }
    }

    /// Read the gallery, failing only when the storage itself fails.
    ///
    /// Corrupt contents read as empty so the next write replaces them.
    fn read_records(&self) -> Result<Vec<PhotoRecord>, StorageError> {
        let Some(raw) = self.storage.get(&self.config.storage_key)? else {
            return Ok(Vec::new());
        };

        let elements = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(elements)) => elements,
            Ok(other) => {
                tracing::warn!(
                    key = %self.config.storage_key,
                    kind = json_kind(&other),
                    "history slot is not a JSON array, treating as empty"
                );
                return Ok(Vec::new());
            }
            Err(e) => {
                tracing::warn!(
                    key = %self.config.storage_key,
                    error = %e,
                    "history slot is corrupt, treating as empty"
                );
                return Ok(Vec::new());
            }
        };

        let total = elements.len();
        let records: Vec<PhotoRecord> = elements
            .into_iter()
            .filter_map(|element| match serde_json::from_value(element) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable history entry");
                    None
                }
            })
            .collect();

        if records.len() < total {
            tracing::debug!(kept = records.len(), total, "loaded history with skipped entries");
        }

        Ok(records)
    }

    /// Look up a single record by id
    pub fn get(&self, id: &str) -> Option<PhotoRecord> {
        self.load().into_iter().find(|record| record.id == id)
    }

    pub fn len(&self) -> usize {
        self.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Prepend `record` and persist the bounded gallery.
    ///
    /// A record with the same id is replaced. When the write is rejected
    /// for capacity, the gallery is cut to the degrade floor (or to half
    /// its size, whichever is smaller) and written once more; a second
    /// capacity failure abandons the save. A failed read writes nothing.
    pub fn save(&mut self, record: PhotoRecord) -> Result<SaveOutcome, StorageError> {
        let mut records = self.read_records()?;
        records.retain(|existing| existing.id != record.id);
        records.insert(0, record);
        records.truncate(self.config.max_history_size);

        let error = match self.write(&records) {
            Ok(()) => {
                tracing::debug!(kept = records.len(), "saved history");
                return Ok(SaveOutcome::Stored { kept: records.len() });
            }
            Err(e) if e.is_quota_exceeded() => e,
            Err(e) => return Err(e),
        };

        let limit = self.config.degrade_floor.min(records.len() / 2).max(1);
        tracing::warn!(
            kept = records.len(),
            limit,
            error = %error,
            "history write exceeded storage quota"
        );
        if limit >= records.len() {
            // Nothing left to shed
            return Err(error);
        }

        records.truncate(limit);
        self.write(&records)?;
        tracing::warn!(kept = records.len(), "history saved after shrinking to fit storage quota");
        Ok(SaveOutcome::Degraded { kept: records.len() })
    }

    /// Remove the record with `id` and return the remaining gallery.
    ///
    /// Removing an id that isn't present changes nothing. A failed read
    /// writes nothing.
    pub fn remove(&mut self, id: &str) -> Result<Vec<PhotoRecord>, StorageError> {
        let mut records = self.read_records()?;
        let before = records.len();
        records.retain(|record| record.id != id);

        if records.len() != before {
            self.write(&records)?;
            tracing::debug!(id, remaining = records.len(), "removed history entry");
        }

        Ok(records)
    }

    /// Drop the whole gallery
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.storage.remove(&self.config.storage_key)
    }

    fn write(&mut self, records: &[PhotoRecord]) -> Result<(), StorageError> {
        let json = serde_json::to_string(records)?;
        self.storage.set(&self.config.storage_key, &json)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl<S: KeyValueStorage> std::fmt::Debug for HistoryStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("config", &self.config)
            .finish()
    }
}
