//! Uploader tuning knobs.
//!
//! Loaded from TOML; every field is optional:
//!
//! ```toml
//! chunk_size = 48000000
//! max_concurrency = 4
//! prefill_factor = 4
//! max_retries = 3
//! chunk_timeout_secs = 120
//! event_buffer = 256
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors from loading or validating an [`UploaderConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploaderConfig {
    /// Chunk size in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Number of chunks transmitted at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// The work queue stages `prefill_factor * max_concurrency` chunks ahead.
    #[serde(default = "default_prefill_factor")]
    pub prefill_factor: usize,

    /// Retries per chunk after its first failure (3 = 4 attempts in total).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-chunk watchdog; a transmission that takes longer counts as failed.
    #[serde(default = "default_chunk_timeout_secs")]
    pub chunk_timeout_secs: u64,

    /// Capacity of the upload event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_chunk_size() -> u64 {
    chunkload_transfer::DEFAULT_CHUNK_SIZE
}

fn default_max_concurrency() -> usize {
    4
}

fn default_prefill_factor() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_chunk_timeout_secs() -> u64 {
    120
}

fn default_event_buffer() -> usize {
    256
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_concurrency: default_max_concurrency(),
            prefill_factor: default_prefill_factor(),
            max_retries: default_max_retries(),
            chunk_timeout_secs: default_chunk_timeout_secs(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl UploaderConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "uploader config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be > 0".into()));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid("max_concurrency must be > 0".into()));
        }
        if self.prefill_factor == 0 {
            return Err(ConfigError::Invalid("prefill_factor must be > 0".into()));
        }
        if self.chunk_timeout_secs == 0 {
            return Err(ConfigError::Invalid("chunk_timeout_secs must be > 0".into()));
        }
        Ok(())
    }

    /// Number of chunks the work queue keeps staged ahead of dispatch.
    pub fn stage_target(&self) -> usize {
        self.prefill_factor.saturating_mul(self.max_concurrency)
    }

    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs)
    }
}
