//! Shared data structures for the application state
//!
//! These structs represent the data model that flows between
//! the storage layer, the editing timeline and the CLI.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Reserved id of the seed iteration (the unedited photo)
pub const ORIGINAL_ITERATION_ID: &str = "original";

/// Prompt text carried by the seed iteration
pub const ORIGINAL_PROMPT: &str = "Original Photo";

/// A single entry in the persisted history gallery
///
/// Serialized in camelCase so the stored JSON keeps the gallery layout:
/// `{ "id", "originalImage", "editedImage", "prompt", "timestamp" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    /// Unique, time-ordered id (UUIDv7)
    pub id: String,
    /// Encoded original image (data URI or reference string)
    pub original_image: String,
    /// Encoded edited image, `None` until an edit succeeds
    #[serde(default)]
    pub edited_image: Option<String>,
    /// Free-text description of the edit
    #[serde(default)]
    pub prompt: String,
    /// Creation time, ISO-8601 UTC
    pub timestamp: String,
}

impl PhotoRecord {
    /// Create a new record stamped with a fresh id and the current time
    pub fn new(
        original_image: impl Into<String>,
        edited_image: Option<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            original_image: original_image.into(),
            edited_image,
            prompt: prompt.into(),
            timestamp: iso_timestamp(Utc::now()),
        }
    }

    /// Whether an edit has been applied to this photo
    pub fn is_edited(&self) -> bool {
        self.edited_image.is_some()
    }

    /// Parse the stored timestamp, `None` if it is not valid RFC 3339
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Format a timestamp the way browsers do (`2026-10-18T09:30:00.000Z`)
pub fn iso_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// One step in the in-memory editing timeline
#[derive(Debug, Clone, PartialEq)]
pub struct EditIteration {
    /// `"original"` for the seed iteration, `edit-<sequence>` afterwards
    pub id: String,
    /// Encoded image for this step
    pub image: String,
    /// How this step was produced
    pub prompt: String,
    /// Wall-clock creation time (display only, never used for ordering)
    pub timestamp: DateTime<Utc>,
    /// Supplementary description returned by the backend, if any
    pub analysis: Option<String>,
    /// Position in append order, 0 for the original
    pub sequence: u64,
}

impl EditIteration {
    /// Whether this is the unedited seed iteration
    pub fn is_original(&self) -> bool {
        self.id == ORIGINAL_ITERATION_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_camel_case() {
        let record = PhotoRecord::new("data:image/jpeg;base64,AAA", None, "make it sunny");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["originalImage"], "data:image/jpeg;base64,AAA");
        assert!(json["editedImage"].is_null());
        assert_eq!(json["prompt"], "make it sunny");
        assert!(json.get("original_image").is_none());
    }

    #[test]
    fn test_record_tolerates_missing_optional_fields() {
        let json = r#"{"id":"1","originalImage":"x","timestamp":"2026-10-18T09:30:00.000Z"}"#;
        let record: PhotoRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.edited_image, None);
        assert_eq!(record.prompt, "");
        assert!(!record.is_edited());
        assert!(record.created_at().is_some());
    }

    #[test]
    fn test_timestamp_format() {
        let record = PhotoRecord::new("x", Some("y".into()), "p");
        assert!(record.timestamp.ends_with('Z'));
        assert_eq!(record.timestamp.len(), "2026-10-18T09:30:00.000Z".len());
        assert!(record.created_at().is_some());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = PhotoRecord::new("x", None, "");
        let b = PhotoRecord::new("x", None, "");
        assert_ne!(a.id, b.id);
    }
}
