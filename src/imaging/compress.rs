use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

use super::payload::{parse_data_uri, to_data_uri};

/// Longest edge of images written to history
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// JPEG quality used for history images (0.0 exclusive to 1.0)
pub const DEFAULT_QUALITY: f32 = 0.7;

#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    /// The payload could not be decoded as an image
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("quality must be in (0, 1], got {0}")]
    InvalidQuality(f32),

    #[error("max dimension must be at least 1 pixel")]
    InvalidDimension,

    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("compression task failed: {0}")]
    Task(String),
}

impl CompressError {
    pub fn is_decode(&self) -> bool {
        matches!(self, CompressError::Decode(_))
    }
}

/// Compression parameters for images written to history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionSettings {
    /// Longest edge in pixels; smaller images are left as they are
    pub max_dimension: u32,
    /// Lossy encode quality in (0, 1]
    pub quality: f32,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            quality: DEFAULT_QUALITY,
        }
    }
}

/// Downscale and re-encode an image payload as JPEG.
///
/// Decode and encode are CPU-bound, so they run on the blocking pool.
/// Returns a `data:image/jpeg;base64,...` URI.
pub async fn compress(
    payload: String,
    max_dimension: u32,
    quality: f32,
) -> Result<String, CompressError> {
    tokio::task::spawn_blocking(move || compress_blocking(&payload, max_dimension, quality))
        .await
        .map_err(|e| CompressError::Task(e.to_string()))?
}

/// Blocking version of `compress`
pub fn compress_blocking(
    payload: &str,
    max_dimension: u32,
    quality: f32,
) -> Result<String, CompressError> {
    if max_dimension == 0 {
        return Err(CompressError::InvalidDimension);
    }
    let jpeg_quality = jpeg_quality(quality)?;

    let img = decode(payload)?;
    let (width, height) = img.dimensions();
    let (target_width, target_height) = target_dimensions(width, height, max_dimension);

    let img = if (target_width, target_height) == (width, height) {
        img
    } else {
        img.resize_exact(target_width, target_height, FilterType::Lanczos3)
    };

    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, jpeg_quality)
        .encode_image(&rgb)
        .map_err(CompressError::Encode)?;

    tracing::debug!(
        from = %format!("{}x{}", width, height),
        to = %format!("{}x{}", target_width, target_height),
        bytes = jpeg.len(),
        "compressed image"
    );

    Ok(to_data_uri("image/jpeg", &jpeg))
}

/// Intrinsic width and height of an image payload
pub fn dimensions(payload: &str) -> Result<(u32, u32), CompressError> {
    Ok(decode(payload)?.dimensions())
}

/// Size an image must be scaled to so its longer edge fits `max_dimension`.
///
/// Images already within bounds keep their size (never upscaled).
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }

    let scale = |edge: u32, longer: u32| -> u32 {
        let scaled = (edge as f64 * max_dimension as f64 / longer as f64).round() as u32;
        scaled.clamp(1, max_dimension)
    };

    if width >= height {
        (max_dimension, scale(height, width))
    } else {
        (scale(width, height), max_dimension)
    }
}

fn decode(payload: &str) -> Result<DynamicImage, CompressError> {
    let uri = parse_data_uri(payload).map_err(|e| CompressError::Decode(e.to_string()))?;
    image::load_from_memory(&uri.bytes).map_err(|e| CompressError::Decode(e.to_string()))
}

fn jpeg_quality(quality: f32) -> Result<u8, CompressError> {
    if !(quality > 0.0 && quality <= 1.0) {
        return Err(CompressError::InvalidQuality(quality));
    }
    Ok((quality * 100.0).round().clamp(1.0, 100.0) as u8)
}
