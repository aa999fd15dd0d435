//! Encoded image payloads
//!
//! Images move through the app as strings: either a `data:` URI
//! carrying base64 bytes, or an opaque reference (an https URL or a
//! blob URL) that only the UI can resolve.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// A decoded `data:` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("payload is not a data URI")]
    NotDataUri,

    #[error("data URI is not base64 encoded")]
    NotBase64,

    #[error("invalid base64 in data URI: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Whether `payload` is an inline `data:` URI
pub fn is_data_uri(payload: &str) -> bool {
    payload.trim_start().starts_with("data:")
}

/// Parse a base64 `data:` URI into its MIME type and bytes
pub fn parse_data_uri(payload: &str) -> Result<DataUri, PayloadError> {
    let rest = payload
        .trim()
        .strip_prefix("data:")
        .ok_or(PayloadError::NotDataUri)?;
    let (header, body) = rest.split_once(',').ok_or(PayloadError::NotDataUri)?;

    // header looks like "image/png;base64" (parameters may sit in between)
    let mut parts = header.split(';');
    let mime_type = parts.next().unwrap_or_default().trim().to_string();
    if !parts.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(PayloadError::NotBase64);
    }

    let bytes = BASE64.decode(body.trim())?;
    Ok(DataUri {
        mime_type: if mime_type.is_empty() {
            "application/octet-stream".to_string()
        } else {
            mime_type
        },
        bytes,
    })
}

/// Build a base64 `data:` URI
pub fn to_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, BASE64.encode(bytes))
}

/// Size in bytes of the image a payload carries.
///
/// Data URIs report their decoded size, references report `None`.
pub fn payload_size(payload: &str) -> Option<usize> {
    parse_data_uri(payload).ok().map(|uri| uri.bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let uri = to_data_uri("image/png", &[1, 2, 3, 250]);
        assert!(uri.starts_with("data:image/png;base64,"));

        let parsed = parse_data_uri(&uri).unwrap();
        assert_eq!(parsed.mime_type, "image/png");
        assert_eq!(parsed.bytes, vec![1, 2, 3, 250]);
        assert_eq!(payload_size(&uri), Some(4));
    }

    #[test]
    fn test_rejects_references() {
        assert!(matches!(
            parse_data_uri("https://example.com/cat.png"),
            Err(PayloadError::NotDataUri)
        ));
        assert!(!is_data_uri("blob:https://example.com/1234"));
        assert_eq!(payload_size("https://example.com/cat.png"), None);
    }

    #[test]
    fn test_rejects_non_base64_uri() {
        assert!(matches!(
            parse_data_uri("data:text/plain,hello"),
            Err(PayloadError::NotBase64)
        ));
        assert!(matches!(
            parse_data_uri("data:image/png;base64,@@@"),
            Err(PayloadError::Base64(_))
        ));
    }

    #[test]
    fn test_parameters_before_base64() {
        let uri = format!("data:image/jpeg;name=a.jpg;base64,{}", BASE64.encode(b"jpg"));
        let parsed = parse_data_uri(&uri).unwrap();
        assert_eq!(parsed.mime_type, "image/jpeg");
        assert_eq!(parsed.bytes, b"jpg");
    }
}
