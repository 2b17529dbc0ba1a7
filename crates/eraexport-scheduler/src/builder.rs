//! Fluent builder API for exporter configurations.
//!
//! # Example
//!
//! ```rust,no_run
//! use eraexport_scheduler::SchedulerBuilder;
//!
//! let config = SchedulerBuilder::new()
//!     .export_dir("/var/lib/eraexport/export")
//!     .end_session_block_distance(20)
//!     .era_scanner("/var/lib/eraexport/scanner")
//!     .start_from_era(1200)
//!     .build_config()
//!     .unwrap();
//! ```

use std::path::PathBuf;

use eraexport_core::config::ExporterConfig;
use eraexport_core::error::ConfigError;
use eraexport_core::retry::RetryConfig;
use eraexport_core::types::{BlockNumber, EraIndex};

/// Fluent builder for `ExporterConfig`.
#[derive(Default)]
pub struct SchedulerBuilder {
    config: ExporterConfig,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            config: ExporterConfig::default(),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: ExporterConfig) -> Self {
        Self { config }
    }

    /// Set the directory export files are written to.
    pub fn export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.export_dir = dir.into();
        self
    }

    /// Set the boundary threshold in blocks.
    pub fn end_session_block_distance(mut self, blocks: BlockNumber) -> Self {
        self.config.end_session_block_distance = blocks;
        self
    }

    /// Set the number of addresses per upstream call.
    pub fn api_chunk_size(mut self, size: usize) -> Self {
        self.config.api_chunk_size = size;
        self
    }

    /// Only export sessions, never eras.
    pub fn session_only(mut self, enabled: bool) -> Self {
        self.config.session_only = enabled;
        self
    }

    /// Enable the era scanner with its checkpoint in `data_dir`.
    pub fn era_scanner(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.config.era_scanner.enabled = true;
        self.config.era_scanner.data_dir = data_dir.into();
        self
    }

    /// Seed for a missing checkpoint.
    pub fn start_from_era(mut self, era: EraIndex) -> Self {
        self.config.era_scanner.start_from_era = Some(era);
        self
    }

    /// Re-scan every `secs` seconds in addition to era-change events.
    pub fn rescan_interval_secs(mut self, secs: u64) -> Self {
        self.config.era_scanner.rescan_interval_secs = Some(secs);
        self
    }

    /// Export the last `size` eras once, then stop.
    pub fn historic(mut self, size: usize) -> Self {
        self.config.historic.enabled = true;
        self.config.historic.history_size = size;
        self
    }

    /// Stop after the first upload.
    pub fn cronjob(mut self, enabled: bool) -> Self {
        self.config.cronjob.enabled = enabled;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn trigger_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.trigger_queue_capacity = capacity;
        self
    }

    /// Validate and build the `ExporterConfig`.
    pub fn build_config(self) -> Result<ExporterConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
