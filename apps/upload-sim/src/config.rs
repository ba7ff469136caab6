//! Simulator configuration.
//!
//! Read from the path given on the command line, else from
//! `upload-sim.toml` in the working directory, else defaults:
//!
//! ```toml
//! [uploader]
//! chunk_size = 1048576
//! max_concurrency = 4
//!
//! [simulation]
//! failure_rate = 0.05
//! latency_ms = 10
//! always_fail = ["broken.bin"]
//! ```

use std::path::{Path, PathBuf};

use chunkload_uploader::UploaderConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_CONFIG_FILE: &str = "upload-sim.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub uploader: UploaderConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Behaviour of the simulated remote and the upload target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Probability (0.0-1.0) that any chunk attempt fails.
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,

    /// Delay per chunk, in milliseconds.
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,

    /// Remote paths whose chunks are always rejected.
    #[serde(default)]
    pub always_fail: Vec<String>,

    /// Fixed RNG seed for reproducible runs.
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default = "default_owner")]
    pub owner: String,

    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_connection")]
    pub connection: String,

    /// Directory within the collection to upload into.
    #[serde(default)]
    pub destination: String,
}

fn default_failure_rate() -> f64 {
    0.05
}

fn default_latency_ms() -> u64 {
    10
}

fn default_owner() -> String {
    "demo".into()
}

fn default_name() -> String {
    "sample-project".into()
}

fn default_connection() -> String {
    "CodeBrowser_allFiles".into()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            failure_rate: default_failure_rate(),
            latency_ms: default_latency_ms(),
            always_fail: Vec::new(),
            seed: None,
            owner: default_owner(),
            name: default_name(),
            connection: default_connection(),
            destination: String::new(),
        }
    }
}

impl SimConfig {
    /// Loads `path`, or the default config file if present, or defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    return Ok(Self::default());
                }
                fallback
            }
        };

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.uploader.validate()?;
        if !(0.0..=1.0).contains(&config.simulation.failure_rate) {
            anyhow::bail!(
                "failure_rate must be within 0.0..=1.0, got {}",
                config.simulation.failure_rate
            );
        }
        Ok(config)
    }
}
