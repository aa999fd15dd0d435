//! Photo capture-and-edit core
//!
//! A captured photo is opened in an `EditSession`, edited through an
//! `EditBackend`, and every result is compressed and saved to a bounded
//! `HistoryStore` that sheds old entries when storage runs out.

pub mod backend;
pub mod config;
pub mod imaging;
pub mod state;
pub mod storage;
pub mod studio;

pub use backend::{normalize_output, BackendError, EditBackend, EditOutput};
pub use config::{ConfigError, StudioConfig};
pub use imaging::{CompressError, CompressionSettings};
pub use state::data::{EditIteration, PhotoRecord};
pub use state::edit::{EditSession, SessionError};
pub use state::history::{HistoryConfig, HistoryStore, SaveOutcome};
pub use storage::{KeyValueStorage, MemoryStorage, SqliteStorage, StorageError};
pub use studio::{Studio, StudioError};
