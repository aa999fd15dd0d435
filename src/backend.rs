//! AI edit backend boundary
//!
//! The concrete image-editing services answer in different shapes: a
//! bare URL string, an object with a `url` or `image` field, or a
//! Gemini-style list of content parts with `inlineData`. Everything is
//! normalised here, once, into an `EditOutput`.

use serde::Deserialize;
use serde_json::Value;

use crate::imaging::payload::to_data_uri;

/// Normalised result of a successful edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOutput {
    /// Encoded image payload (data URI or URL)
    pub image: String,
    /// Supplementary description, when the backend sends one
    pub analysis: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The backend reported a failure
    #[error("edit request failed: {0}")]
    Request(String),

    /// The backend answered with a shape we don't know how to read
    #[error("unrecognized backend output shape: {0}")]
    UnrecognizedOutputShape(String),
}

/// Something that can edit an image according to a prompt.
///
/// Implementations return the backend's raw JSON output; callers run it
/// through `normalize_output`.
#[allow(async_fn_in_trait)]
pub trait EditBackend {
    async fn edit(&self, image: &str, prompt: &str) -> Result<Value, BackendError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

/// Every output shape the backends are known to produce
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawOutput {
    /// Bare URL or data URI
    Reference(String),
    /// `{ "inlineData": { "mimeType", "data" } }`
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    /// `{ "url": ... }`
    WithUrl {
        url: String,
        #[serde(default, alias = "text")]
        analysis: Option<String>,
    },
    /// `{ "image": ... }`
    WithImage {
        image: String,
        #[serde(default, alias = "text")]
        analysis: Option<String>,
    },
    /// `{ "text": ... }` part next to an image part
    Text { text: String },
}

/// Decode a backend response into an `EditOutput`.
///
/// Lists are scanned in order: the first image-bearing element wins and
/// the first text part, if any, becomes the analysis.
pub fn normalize_output(value: Value) -> Result<EditOutput, BackendError> {
    match value {
        Value::Array(elements) => {
            let mut image = None;
            let mut text = None;

            for element in elements {
                match decode_single(element) {
                    Some(Decoded::Image(output)) if image.is_none() => image = Some(output),
                    Some(Decoded::Text(t)) if text.is_none() => text = Some(t),
                    _ => {}
                }
            }

            let mut output = image.ok_or_else(|| {
                BackendError::UnrecognizedOutputShape("no image in output list".to_string())
            })?;
            if output.analysis.is_none() {
                output.analysis = text;
            }
            Ok(output)
        }
        other => {
            let summary = summarize(&other);
            match decode_single(other) {
                Some(Decoded::Image(output)) => Ok(output),
                _ => Err(BackendError::UnrecognizedOutputShape(summary)),
            }
        }
    }
}

enum Decoded {
    Image(EditOutput),
    Text(String),
}

fn decode_single(value: Value) -> Option<Decoded> {
    let raw: RawOutput = serde_json::from_value(value).ok()?;
    let decoded = match raw {
        RawOutput::Reference(image) if !image.trim().is_empty() => Decoded::Image(EditOutput {
            image,
            analysis: None,
        }),
        RawOutput::Reference(_) => return None,
        RawOutput::Inline { inline_data } => Decoded::Image(EditOutput {
            image: format!("data:{};base64,{}", inline_data.mime_type, inline_data.data),
            analysis: None,
        }),
        RawOutput::WithUrl { url, analysis } => Decoded::Image(EditOutput {
            image: url,
            analysis,
        }),
        RawOutput::WithImage { image, analysis } => Decoded::Image(EditOutput { image, analysis }),
        RawOutput::Text { text } => Decoded::Text(text),
    };
    Some(decoded)
}

/// Short description of a JSON value for error messages
fn summarize(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("object with keys [{}]", keys.join(", "))
        }
        Value::Null => "null".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "empty string".to_string(),
        Value::Array(_) => "array".to_string(),
    }
}

/// Backend that answers every request with the same raw output.
///
/// Useful for offline runs and tests.
#[derive(Debug, Clone)]
pub struct FixedBackend {
    output: Result<Value, BackendError>,
}

impl FixedBackend {
    pub fn new(output: Value) -> Self {
        Self { output: Ok(output) }
    }

    /// Backend answering with an inline image built from raw bytes
    pub fn with_image(mime_type: &str, bytes: &[u8]) -> Self {
        Self::new(Value::String(to_data_uri(mime_type, bytes)))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            output: Err(BackendError::Request(message.into())),
        }
    }
}

impl EditBackend for FixedBackend {
    async fn edit(&self, _image: &str, _prompt: &str) -> Result<Value, BackendError> {
        self.output.clone()
    }
}
