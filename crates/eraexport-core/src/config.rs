//! Exporter configuration.
//!
//! Loaded from a JSON file with camelCase keys:
//!
//! ```json
//! {
//!   "logLevel": "info",
//!   "exportDir": "./data/export",
//!   "endSessionBlockDistance": 20,
//!   "apiChunkSize": 3000,
//!   "eraScanner": { "enabled": true, "dataDir": "./data/scanner", "startFromEra": 1200 },
//!   "retry": { "maxAttempts": 5, "delayMs": 5000 }
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chunk::ChunkSize;
use crate::error::ConfigError;
use crate::retry::RetryConfig;
use crate::types::{BlockNumber, EraIndex};

/// Default checkpoint file name inside `eraScanner.dataDir`.
pub const DEFAULT_CHECKPOINT_FILE: &str = "lastChecked.txt";

/// Eras per historic export request.
pub const HISTORIC_ERA_CHUNK: usize = 10;

/// Top-level exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExporterConfig {
    /// Global log level (`trace` | `debug` | `info` | `warn` | `error`).
    pub log_level: String,
    /// Per-component log level overrides and output format.
    pub log: LogConfig,
    /// Where export files are written before upload.
    pub export_dir: PathBuf,
    /// Boundary threshold in blocks (≈ 2 minutes at 6 s blocks for 20).
    pub end_session_block_distance: BlockNumber,
    /// Addresses per upstream call.
    pub api_chunk_size: usize,
    /// Only produce session exports, never era exports.
    pub session_only: bool,
    /// Checkpoint-driven catch-up mode.
    pub era_scanner: EraScannerConfig,
    /// One-shot export of the last `historySize` eras (head mode only).
    pub historic: HistoricConfig,
    /// Stop after the first upload (head mode only).
    pub cronjob: ToggleConfig,
    pub debug: DebugConfig,
    pub retry: RetryConfig,
    /// Size of the bounded scan-trigger queue.
    pub trigger_queue_capacity: usize,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log: LogConfig::default(),
            export_dir: PathBuf::from("./data/export"),
            end_session_block_distance: 20,
            api_chunk_size: 3000,
            session_only: false,
            era_scanner: EraScannerConfig::default(),
            historic: HistoricConfig::default(),
            cronjob: ToggleConfig::default(),
            debug: DebugConfig::default(),
            retry: RetryConfig::default(),
            trigger_queue_capacity: 16,
        }
    }
}

/// Per-component logging options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogConfig {
    /// component name → level
    pub components: HashMap<String, String>,
    /// Emit JSON structured logs instead of human-readable text.
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EraScannerConfig {
    pub enabled: bool,
    /// Directory holding the checkpoint file.
    pub data_dir: PathBuf,
    pub checkpoint_file_name: String,
    /// Checkpoint seed used when no checkpoint exists yet.
    pub start_from_era: Option<EraIndex>,
    /// Periodic re-scan in addition to era-change events.
    pub rescan_interval_secs: Option<u64>,
}

impl Default for EraScannerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            data_dir: PathBuf::from("./data/scanner"),
            checkpoint_file_name: DEFAULT_CHECKPOINT_FILE.into(),
            start_from_era: None,
            rescan_interval_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoricConfig {
    pub enabled: bool,
    pub history_size: usize,
}

impl Default for HistoricConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            history_size: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToggleConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DebugConfig {
    pub enabled: bool,
    /// Export the current era and session right after startup.
    pub force_initial_write: bool,
}

impl ExporterConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunk_size()?;
        if self.end_session_block_distance == 0 {
            return Err(invalid("endSessionBlockDistance", "must be greater than 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.maxAttempts", "must be greater than 0"));
        }
        let multiplier = self.retry.backoff_multiplier;
        if multiplier.is_nan() || multiplier < 1.0 {
            return Err(invalid("retry.backoffMultiplier", "must be at least 1.0"));
        }
        if self.trigger_queue_capacity == 0 {
            return Err(invalid("triggerQueueCapacity", "must be greater than 0"));
        }
        if self.era_scanner.enabled {
            if self.era_scanner.data_dir.as_os_str().is_empty() {
                return Err(invalid("eraScanner.dataDir", "must not be empty"));
            }
            if self.era_scanner.checkpoint_file_name.trim().is_empty() {
                return Err(invalid("eraScanner.checkpointFileName", "must not be empty"));
            }
            if self.era_scanner.rescan_interval_secs == Some(0) {
                return Err(invalid("eraScanner.rescanIntervalSecs", "must be greater than 0"));
            }
        }
        if self.historic.enabled && self.historic.history_size == 0 {
            return Err(invalid("historic.historySize", "must be greater than 0"));
        }
        Ok(())
    }

    /// The validated `apiChunkSize`.
    pub fn chunk_size(&self) -> Result<ChunkSize, ConfigError> {
        ChunkSize::new(self.api_chunk_size)
    }

    /// Effective global log level (`debug.enabled` forces `debug`).
    pub fn effective_log_level(&self) -> &str {
        if self.debug.enabled {
            "debug"
        } else {
            &self.log_level
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
