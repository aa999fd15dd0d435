//! Image payload handling
//!
//! This module handles:
//! - Parsing and building `data:` URI payloads
//! - Downscaling and re-encoding images before they go to history

pub mod compress;
pub mod payload;

pub use compress::{compress, compress_blocking, CompressError, CompressionSettings};
