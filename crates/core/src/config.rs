//! Engine configuration loading.
//!
//! Deadlines and channel sizing are configurable from a TOML file; every
//! field has a default so a missing file or empty table is valid.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read a configuration file from disk.
    #[error("Failed to read config file at {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse TOML configuration.
    #[error("Failed to parse TOML file at {path}: {source}")]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Type alias for Result with ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tunable parameters for one engine instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-task deadline for the parallel stage, in milliseconds.
    /// Exceeding it fails that task only; siblings keep running.
    pub task_deadline_ms: Option<u64>,

    /// Deadline for each sequential stage (gate, synthesis, report), in
    /// milliseconds. Exceeding it aborts the run.
    pub stage_deadline_ms: Option<u64>,

    /// Capacity of the run's event channel.
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            task_deadline_ms: None,
            stage_deadline_ms: None,
            channel_capacity: 64,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn task_deadline(&self) -> Option<Duration> {
        self.task_deadline_ms.map(Duration::from_millis)
    }

    pub fn stage_deadline(&self) -> Option<Duration> {
        self.stage_deadline_ms.map(Duration::from_millis)
    }
}
