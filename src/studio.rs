use crate::backend::{normalize_output, BackendError, EditBackend};
use crate::imaging::{compress, payload, CompressionSettings};
use crate::state::data::{EditIteration, PhotoRecord};
use crate::state::edit::{EditSession, SessionError};
use crate::state::history::{HistoryStore, SaveOutcome};
use crate::storage::{KeyValueStorage, StorageError};

/// Errors the editing flow reports to its caller.
///
/// History faults are not in here: they are logged and absorbed.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("no history record with id {0}")]
    RecordNotFound(String),
}

/// Editing workspace: the open photo's timeline plus the history gallery.
///
/// Flow: capture → `open_capture` seeds the session → `apply_edit` runs
/// the backend, appends the result and saves a compressed record to
/// history → `open_record` reopens a past photo in a fresh session.
pub struct Studio<S: KeyValueStorage> {
    history: HistoryStore<S>,
    session: EditSession,
    compression: CompressionSettings,
}

impl<S: KeyValueStorage> Studio<S> {
    pub fn new(history: HistoryStore<S>, compression: CompressionSettings) -> Self {
        Self {
            history,
            session: EditSession::new(),
            compression,
        }
    }

    /// The open photo's timeline
    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn history_store(&self) -> &HistoryStore<S> {
        &self.history
    }

    pub fn history_store_mut(&mut self) -> &mut HistoryStore<S> {
        &mut self.history
    }

    /// Persisted gallery, newest first
    pub fn history(&self) -> Vec<PhotoRecord> {
        self.history.load()
    }

    /// Start editing a freshly captured or uploaded image
    pub fn open_capture(&mut self, image: impl Into<String>) {
        self.session.reset();
        self.session.start(image);
        tracing::info!("opened new photo for editing");
    }

    /// Reopen a photo from history in a new session.
    ///
    /// The record's edited image, if any, becomes the first edit and is
    /// selected.
    pub fn open_record(&mut self, id: &str) -> Result<&EditIteration, StudioError> {
        let record = self
            .history
            .get(id)
            .ok_or_else(|| StudioError::RecordNotFound(id.to_string()))?;

        self.session.reset();
        self.session.start(record.original_image);
        if let Some(edited) = record.edited_image {
            self.session.append(edited, record.prompt, None)?;
        }

        let latest = self.session.len() - 1;
        tracing::info!(id, iterations = self.session.len(), "reopened photo from history");
        Ok(self.session.select_iteration(latest)?)
    }

    /// Show an earlier (or later) step of the timeline
    pub fn select(&mut self, index: usize) -> Result<&EditIteration, StudioError> {
        Ok(self.session.select_iteration(index)?)
    }

    /// Edit the currently selected image with `prompt`.
    ///
    /// On success the result is appended to the timeline, selected, and
    /// saved to history (best-effort). Backend failures leave the
    /// timeline untouched.
    pub async fn apply_edit<B: EditBackend>(
        &mut self,
        backend: &B,
        prompt: &str,
    ) -> Result<EditIteration, StudioError> {
        let source = self.session.current()?.image.clone();
        let original = self.session.original()?.image.clone();

        let raw = backend.edit(&source, prompt).await?;
        let output = match normalize_output(raw) {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(error = %e, "backend returned an unusable result");
                return Err(e.into());
            }
        };

        let iteration = self
            .session
            .append(output.image.clone(), prompt, output.analysis)?
            .clone();
        self.session.select_iteration(self.session.len() - 1)?;
        tracing::info!(id = %iteration.id, "edit applied");

        // Best-effort: the edit stands even when history can't keep it
        let _ = self.record(original, Some(output.image), prompt).await;
        Ok(iteration)
    }

    /// Compress and save a history record.
    ///
    /// Returns the record when it was persisted, or the storage error
    /// that kept it out of history. The editing flow ignores that error.
    pub async fn record(
        &mut self,
        original_image: String,
        edited_image: Option<String>,
        prompt: &str,
    ) -> Result<PhotoRecord, StorageError> {
        let original_image = self.compress_for_history(original_image).await;
        let edited_image = match edited_image {
            Some(image) => Some(self.compress_for_history(image).await),
            None => None,
        };

        let record = PhotoRecord::new(original_image, edited_image, prompt);
        match self.history.save(record.clone()) {
            Ok(SaveOutcome::Stored { kept }) => {
                tracing::debug!(id = %record.id, kept, "recorded edit in history");
                Ok(record)
            }
            Ok(SaveOutcome::Degraded { kept }) => {
                tracing::warn!(id = %record.id, kept, "history trimmed to fit storage");
                Ok(record)
            }
            Err(e) => {
                tracing::warn!(id = %record.id, error = %e, "edit not saved to history");
                Err(e)
            }
        }
    }

    /// Delete a photo from history, returning what is left.
    ///
    /// Storage failures are logged and the current gallery returned.
    pub fn delete_record(&mut self, id: &str) -> Vec<PhotoRecord> {
        match self.history.remove(id) {
            Ok(remaining) => remaining,
            Err(e) => {
                tracing::warn!(id, error = %e, "failed to delete history entry");
                self.history.load()
            }
        }
    }

    /// Drop the whole gallery
    pub fn clear_history(&mut self) -> Result<(), StorageError> {
        self.history.clear()
    }

    /// Shrink an image for storage.
    ///
    /// References (URLs) are kept as they are. When the image can't be
    /// decoded, or re-encoding would not make it smaller, the original
    /// payload is stored instead.
    async fn compress_for_history(&self, image: String) -> String {
        if !payload::is_data_uri(&image) {
            return image;
        }

        let settings = self.compression;
        match compress(image.clone(), settings.max_dimension, settings.quality).await {
            Ok(compressed) if compressed.len() < image.len() => compressed,
            Ok(_) => image,
            Err(e) => {
                tracing::warn!(error = %e, "storing image uncompressed");
                image
            }
        }
    }
}

impl<S: KeyValueStorage> std::fmt::Debug for Studio<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Studio")
            .field("history", &self.history)
            .field("iterations", &self.session.len())
            .field("compression", &self.compression)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FixedBackend;
    use crate::imaging::compress::dimensions;
    use crate::imaging::payload::to_data_uri;
    use crate::state::history::HistoryConfig;
    use crate::storage::MemoryStorage;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::io::Cursor;

    fn png_payload(width: u32, height: u32, tint: u8) -> String {
        let buffer = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([tint, (x * 255 / width) as u8, ((x ^ y) & 0xff) as u8])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(buffer)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        to_data_uri("image/png", &bytes)
    }

    fn studio_with(storage: MemoryStorage) -> Studio<MemoryStorage> {
        let settings = CompressionSettings {
            max_dimension: 64,
            quality: 0.6,
        };
        Studio::new(HistoryStore::new(storage, HistoryConfig::default()), settings)
    }

    /// Backend that remembers which image it was asked to edit
    struct RecordingBackend {
        seen: RefCell<Vec<String>>,
        output: Value,
    }

    impl EditBackend for RecordingBackend {
        async fn edit(&self, image: &str, _prompt: &str) -> Result<Value, BackendError> {
            self.seen.borrow_mut().push(image.to_string());
            Ok(self.output.clone())
        }
    }

    #[tokio::test]
    async fn test_edit_appends_and_records() {
        let mut studio = studio_with(MemoryStorage::new());
        studio.open_capture(png_payload(200, 100, 10));

        let backend = FixedBackend::new(json!({
            "image": png_payload(200, 100, 200),
            "analysis": "warmer tones"
        }));
        let iteration = studio.apply_edit(&backend, "make it warm").await.unwrap();

        assert_eq!(iteration.prompt, "make it warm");
        assert_eq!(iteration.analysis.as_deref(), Some("warmer tones"));
        assert_eq!(studio.session().len(), 2);
        assert_eq!(studio.session().current_index(), Some(1));

        let history = studio.history();
        assert_eq!(history.len(), 1);
        let record = &history[0];
        assert_eq!(record.prompt, "make it warm");

        // Both images were shrunk for storage
        assert_eq!(dimensions(&record.original_image).unwrap(), (64, 32));
        let edited = record.edited_image.as_deref().unwrap();
        assert!(edited.starts_with("data:image/jpeg;base64,"));
        assert_eq!(dimensions(edited).unwrap(), (64, 32));
    }

    #[tokio::test]
    async fn test_edit_before_capture_is_rejected() {
        let mut studio = studio_with(MemoryStorage::new());
        let backend = FixedBackend::new(json!("https://x/y.png"));

        let err = studio.apply_edit(&backend, "p").await.unwrap_err();
        assert!(matches!(err, StudioError::Session(SessionError::NotStarted)));
    }

    #[tokio::test]
    async fn test_backend_failure_leaves_state_alone() {
        let mut studio = studio_with(MemoryStorage::new());
        studio.open_capture("https://x/original.png");

        let err = studio
            .apply_edit(&FixedBackend::failing("timeout"), "p")
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::Backend(BackendError::Request(_))));

        let err = studio
            .apply_edit(&FixedBackend::new(json!({ "status": "ok" })), "p")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StudioError::Backend(BackendError::UnrecognizedOutputShape(_))
        ));

        assert_eq!(studio.session().len(), 1);
        assert!(studio.history().is_empty());
    }

    #[tokio::test]
    async fn test_full_storage_does_not_fail_edit() {
        let mut studio = studio_with(MemoryStorage::with_quota(16));
        studio.open_capture("https://x/original.png");

        let backend = FixedBackend::new(json!("https://x/edited.png"));
        let iteration = studio.apply_edit(&backend, "p").await.unwrap();

        assert_eq!(iteration.image, "https://x/edited.png");
        assert_eq!(studio.session().current().unwrap().image, "https://x/edited.png");
        assert!(studio.history().is_empty());
    }

    #[tokio::test]
    async fn test_references_are_stored_as_is() {
        let mut studio = studio_with(MemoryStorage::new());
        studio.open_capture("https://x/original.png");

        let backend = FixedBackend::new(json!(["https://x/edited.png"]));
        studio.apply_edit(&backend, "p").await.unwrap();

        let record = &studio.history()[0];
        assert_eq!(record.original_image, "https://x/original.png");
        assert_eq!(record.edited_image.as_deref(), Some("https://x/edited.png"));
    }

    #[tokio::test]
    async fn test_undecodable_image_is_stored_uncompressed() {
        let mut studio = studio_with(MemoryStorage::new());
        let broken = "data:image/png;base64,AAAA".to_string();
        let record = studio.record(broken.clone(), None, "p").await.unwrap();

        assert_eq!(record.original_image, broken);
        assert_eq!(studio.history()[0].original_image, broken);
    }

    #[tokio::test]
    async fn test_edit_uses_selected_iteration() {
        let mut studio = studio_with(MemoryStorage::new());
        studio.open_capture("https://x/original.png");

        let backend = RecordingBackend {
            seen: RefCell::new(Vec::new()),
            output: json!({ "url": "https://x/next.png" }),
        };
        studio.apply_edit(&backend, "first").await.unwrap();
        studio.apply_edit(&backend, "second").await.unwrap();

        // Go back to the original and branch from there
        studio.select(0).unwrap();
        studio.apply_edit(&backend, "third").await.unwrap();

        let expected: Vec<String> = [
            "https://x/original.png",
            "https://x/next.png",
            "https://x/original.png",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(*backend.seen.borrow(), expected);
        assert_eq!(studio.session().len(), 4);
        assert_eq!(studio.history().len(), 3);
    }

    #[tokio::test]
    async fn test_open_record_reseeds_session() {
        let mut studio = studio_with(MemoryStorage::new());
        studio.open_capture("https://x/original.png");
        studio
            .apply_edit(&FixedBackend::new(json!("https://x/edited.png")), "sky")
            .await
            .unwrap();
        let id = studio.history()[0].id.clone();

        studio.open_capture("https://x/another.png");
        let selected = studio.open_record(&id).unwrap();
        assert_eq!(selected.image, "https://x/edited.png");
        assert_eq!(selected.prompt, "sky");

        let timeline = studio.session().snapshot();
        assert_eq!(timeline.len(), 2);
        assert!(timeline[0].is_original());
        assert_eq!(timeline[0].image, "https://x/original.png");

        assert!(matches!(
            studio.open_record("missing"),
            Err(StudioError::RecordNotFound(_))
        ));
    }

    /// Storage that refuses every write with an I/O error
    struct ReadOnly;

    impl KeyValueStorage for ReadOnly {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }

        fn remove(&mut self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_record_reports_why_history_refused() {
        let mut full = studio_with(MemoryStorage::with_quota(16));
        let err = full.record("https://x/1.png".into(), None, "a").await.unwrap_err();
        assert!(err.is_quota_exceeded());

        let history = HistoryStore::new(ReadOnly, HistoryConfig::default());
        let mut read_only = Studio::new(history, CompressionSettings::default());
        let err = read_only.record("https://x/1.png".into(), None, "a").await.unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));

        // The edit itself still succeeds
        read_only.open_capture("https://x/1.png");
        let backend = FixedBackend::new(json!("https://x/2.png"));
        assert!(read_only.apply_edit(&backend, "p").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_record() {
        let mut studio = studio_with(MemoryStorage::new());
        let first = studio.record("https://x/1.png".into(), None, "a").await.unwrap();
        let second = studio.record("https://x/2.png".into(), None, "b").await.unwrap();

        let remaining = studio.delete_record(&first.id);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, second.id);
        assert_eq!(studio.delete_record(&first.id), remaining);

        studio.clear_history().unwrap();
        assert!(studio.history().is_empty());
    }
}
