// Configuration utilities
// Author: Gabriel Demetrios Lafis

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::storage::{FileRecordStore, MemoryRecordStore, RecordStore, StorageError};
use super::{AppError, AppResult};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Pipeline engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Record sets whose name starts with this prefix are temporary
    pub temp_prefix: String,
    /// Default number of rows returned by a step preview
    pub preview_limit: usize,
    pub continue_on_error: bool,
    pub cleanup_temp_collections: bool,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `memory` or `file`
    #[serde(rename = "type")]
    pub type_: String,
    pub path: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            temp_prefix: "_tmp_".to_string(),
            preview_limit: 10,
            continue_on_error: false,
            cleanup_temp_collections: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            type_: "memory".to_string(),
            path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a `.json`, `.yaml` or `.yml` file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase);

        let config = match extension.as_deref() {
            Some("json") => serde_json::from_str(&contents)
                .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)
                .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?,
            _ => {
                return Err(AppError::Config(format!(
                    "Unsupported config file format: {}",
                    path.display()
                )))
            }
        };

        Ok(config)
    }

    /// Get the log level filter
    pub fn log_level_filter(&self) -> log::LevelFilter {
        match self.logging.level.to_lowercase().as_str() {
            "off" => log::LevelFilter::Off,
            "error" => log::LevelFilter::Error,
            "warn" => log::LevelFilter::Warn,
            "info" => log::LevelFilter::Info,
            "debug" => log::LevelFilter::Debug,
            "trace" => log::LevelFilter::Trace,
            _ => log::LevelFilter::Info,
        }
    }
}

impl StorageConfig {
    /// Open the configured record store
    pub fn open(&self) -> Result<Arc<dyn RecordStore>, StorageError> {
        match self.type_.to_lowercase().as_str() {
            "memory" => Ok(Arc::new(MemoryRecordStore::new())),
            "file" => {
                let path = self.path.as_deref().ok_or_else(|| {
                    StorageError::Other("File storage requires 'path'".to_string())
                })?;
                Ok(Arc::new(FileRecordStore::new(path)?))
            }
            other => Err(StorageError::Other(format!("Unknown storage type: {}", other))),
        }
    }
}
