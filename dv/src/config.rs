//! Configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::decoder::ResultMode;
use crate::manager::RetentionPolicy;
use crate::storage::StorageDirs;

/// Main drakvufd configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker directory layout
    pub storage: StorageConfig,

    /// Task handling
    pub tasks: TaskConfig,

    /// Logging
    pub log: LogConfig,
}

impl Config {
    /// Load configuration
    ///
    /// Order: explicit path, `./.drakvufd.yml`, `~/.config/drakvufd/drakvufd.yml`, defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".drakvufd.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("drakvufd").join("drakvufd.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }
}

/// Worker directory layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Where new samples are dropped for the worker
    #[serde(rename = "incoming-dir")]
    pub incoming_dir: PathBuf,

    /// Where the worker keeps samples under analysis
    #[serde(rename = "processing-dir")]
    pub processing_dir: PathBuf,

    /// Where the worker writes `{task_id}/{result-file}`
    #[serde(rename = "finished-dir")]
    pub finished_dir: PathBuf,

    #[serde(rename = "result-file")]
    pub result_file: String,
}

impl StorageConfig {
    pub fn to_storage_dirs(&self) -> StorageDirs {
        StorageDirs {
            incoming: self.incoming_dir.clone(),
            processing: self.processing_dir.clone(),
            finished: self.finished_dir.clone(),
            result_file: self.result_file.clone(),
        }
    }
}

fn data_dir(name: &str) -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("drakvufd")
        .join(name)
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            incoming_dir: data_dir("incoming"),
            processing_dir: data_dir("processing"),
            finished_dir: data_dir("finished"),
            result_file: crate::DEFAULT_RESULT_FILE.to_string(),
        }
    }
}

/// Task handling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Advertised capacity, reported as free slots
    #[serde(rename = "max-pending")]
    pub max_pending: usize,

    #[serde(rename = "result-mode")]
    pub result_mode: ResultMode,

    /// What Delete does with worker artifacts
    pub retention: RetentionPolicy,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            max_pending: crate::DEFAULT_MAX_PENDING,
            result_mode: ResultMode::Typed,
            retention: RetentionPolicy::Keep,
        }
    }
}

/// Logging
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// TRACE, DEBUG, INFO, WARN or ERROR
    pub level: Option<String>,

    /// Log to this file instead of stderr
    pub file: Option<PathBuf>,
}
