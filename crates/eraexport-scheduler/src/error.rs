//! Top-level scheduler errors.

use std::path::PathBuf;

use thiserror::Error;

use eraexport_core::error::{CheckpointError, ConfigError, RetryError, ScanFailure};

/// Anything that stops the scheduler. Every variant is terminal for the
/// process; transient upstream noise never gets this far.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("upstream call failed: {0}")]
    Upstream(#[from] RetryError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Scan(#[from] ScanFailure),

    #[error("export directory {path}: {source}")]
    ExportDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SchedulerError {
    /// Process exit code for this failure. Always non-zero.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            _ => 1,
        }
    }
}

/// How a scheduler run ended successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// The chain subscription ended and all queued work was drained.
    StreamEnded,
    /// A one-shot job (cronjob or historic export) completed.
    OneShotComplete,
}
