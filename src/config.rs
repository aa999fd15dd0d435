//! Application configuration
//!
//! Stored as JSON in the user's config directory:
//! - Linux: ~/.config/photo-remix/config.json
//! - macOS: ~/Library/Application Support/photo-remix/config.json
//! - Windows: %APPDATA%\photo-remix\config.json
//!
//! Every field is optional in the file; missing ones take their defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::imaging::CompressionSettings;
use crate::state::history::{
    HistoryConfig, DEFAULT_DEGRADE_FLOOR, DEFAULT_MAX_HISTORY_SIZE, DEFAULT_STORAGE_KEY,
};
use crate::storage::DEFAULT_QUOTA_BYTES;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// All tunable settings
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StudioConfig {
    /// Key of the history slot in storage
    pub storage_key: String,

    /// Maximum number of photos kept in history
    pub max_history_size: usize,

    /// History size to fall back to when storage is full
    pub degrade_floor: usize,

    /// Storage capacity in bytes
    pub storage_quota_bytes: usize,

    /// Re-encoding applied to images before they are stored
    pub compression: CompressionSettings,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            max_history_size: DEFAULT_MAX_HISTORY_SIZE,
            degrade_floor: DEFAULT_DEGRADE_FLOOR,
            storage_quota_bytes: DEFAULT_QUOTA_BYTES,
            compression: CompressionSettings::default(),
        }
    }
}

impl StudioConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("photo-remix");
        path.push("config.json");
        Some(path)
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing default file gives the defaults. A path given explicitly
    /// must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                Some(path) => {
                    tracing::debug!(path = %path.display(), "no config file, using defaults");
                    return Ok(Self::default());
                }
                None => {
                    tracing::debug!("no config directory, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let json = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_json(&json).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        config.validate()?;

        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse from a JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Convert to a pretty JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check the values make sense together
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_key.trim().is_empty() {
            return Err(ConfigError::Invalid("storage_key must not be empty".into()));
        }
        if self.max_history_size == 0 {
            return Err(ConfigError::Invalid("max_history_size must be at least 1".into()));
        }
        if self.degrade_floor == 0 || self.degrade_floor > self.max_history_size {
            return Err(ConfigError::Invalid(format!(
                "degrade_floor must be between 1 and max_history_size ({})",
                self.max_history_size
            )));
        }
        if self.compression.max_dimension == 0 {
            return Err(ConfigError::Invalid(
                "compression.max_dimension must be at least 1".into(),
            ));
        }
        let quality = self.compression.quality;
        if !(quality > 0.0 && quality <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "compression.quality must be in (0, 1], got {}",
                quality
            )));
        }
        Ok(())
    }

    /// History settings derived from this config
    pub fn history(&self) -> HistoryConfig {
        HistoryConfig {
            storage_key: self.storage_key.clone(),
            max_history_size: self.max_history_size,
            degrade_floor: self.degrade_floor,
        }
    }
}
