//! Configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::generator::ShufflePolicy;
use crate::shm::{DEFAULT_PREFIX, ResourceNames, ShmError};

/// Main configuration shared by the supervisor and the generators
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shared resource naming and waiting
    pub shm: ShmConfig,

    /// Generator search settings
    pub generator: GeneratorConfig,

    /// Log output
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, it must load
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: ./fbarcset.yml
        let local_config = PathBuf::from("fbarcset.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/fbarcset/fbarcset.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("fbarcset").join("fbarcset.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::debug!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Shared resource configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShmConfig {
    /// Name prefix for the region and semaphores, e.g. `/fb_arc_set_shm`
    pub prefix: String,

    /// Upper bound on a single semaphore wait before the phase is re-checked;
    /// 0 waits indefinitely
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,
}

impl Default for ShmConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            poll_interval_ms: 200,
        }
    }
}

impl ShmConfig {
    pub fn names(&self) -> Result<ResourceNames, ShmError> {
        ResourceNames::from_prefix(&self.prefix)
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_ms > 0).then(|| Duration::from_millis(self.poll_interval_ms))
    }
}

/// Generator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// When to reshuffle relative to deriving a candidate
    pub shuffle: ShufflePolicy,

    /// Fixed RNG seed; derived from pid and clock when absent
    pub seed: Option<u64>,

    /// Sleep between checks while the supervisor is still initializing
    #[serde(rename = "startup-poll-ms")]
    pub startup_poll_ms: u64,

    /// How long to keep retrying a region the supervisor has not sized yet
    #[serde(rename = "attach-timeout-ms")]
    pub attach_timeout_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            shuffle: ShufflePolicy::default(),
            seed: None,
            startup_poll_ms: 10,
            attach_timeout_ms: 1000,
        }
    }
}

impl GeneratorConfig {
    pub fn startup_poll(&self) -> Duration {
        Duration::from_millis(self.startup_poll_ms.max(1))
    }

    pub fn attach_timeout(&self) -> Duration {
        Duration::from_millis(self.attach_timeout_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Append logs to this file instead of stderr
    pub file: Option<PathBuf>,
}
