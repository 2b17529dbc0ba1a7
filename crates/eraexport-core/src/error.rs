//! Error types for the export scheduling core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::EraIndex;

/// Errors raised by the external collaborators (chain data provider,
/// export pipeline, uploader).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection dropped, refused or timed out.
    #[error("connection error: {0}")]
    Connection(String),

    /// The node answered but the call failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Chain data could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Local I/O failure while writing or uploading export files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A failure known to be permanent; never retried.
    #[error("fatal: {0}")]
    Fatal(String),

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Returns `true` if the error is typed as permanent.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// Failure of a call guarded by the retrying caller.
#[derive(Debug, Error)]
pub enum RetryError {
    /// The call failed with a fatal error and was not retried further.
    #[error("'{operation}' failed unrecoverably after {attempts} attempt(s): {source}")]
    Unrecoverable {
        operation: String,
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    /// Every attempt failed with a transient error.
    #[error("'{operation}' exhausted {attempts} attempt(s): {source}")]
    ExhaustedRetries {
        operation: String,
        attempts: u32,
        #[source]
        source: ProviderError,
    },
}

impl RetryError {
    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Unrecoverable { attempts, .. } | Self::ExhaustedRetries { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Errors from the durable era checkpoint.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint at {path} is corrupt: {content:?}")]
    Corrupt { path: PathBuf, content: String },

    #[error("no checkpoint and no seed: active era is 0 and eraScanner.startFromEra is unset")]
    Unseedable,

    #[error("eraScanner.startFromEra {seed} is not a finished era (active era is {active_era})")]
    SeedAhead { seed: EraIndex, active_era: EraIndex },

    #[error("checkpoint must advance one era at a time: at {current}, got {next}")]
    NonMonotonic { current: EraIndex, next: EraIndex },

    #[error("checkpoint has not been initialised")]
    Uninitialised,
}

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config field '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors that escape a scan body.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Retry(#[from] RetryError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("scan aborted: {0}")]
    Aborted(String),
}

/// Terminal failure of the scan coordinator.
#[derive(Debug, Error)]
#[error("scan failed (last checkpoint: {}): {source}", display_checkpoint(.last_checkpoint))]
pub struct ScanFailure {
    /// Checkpoint value at the time of failure, if it could be read.
    pub last_checkpoint: Option<EraIndex>,
    #[source]
    pub source: ScanError,
}

fn display_checkpoint(cp: &Option<EraIndex>) -> String {
    cp.map(|e| e.to_string()).unwrap_or_else(|| "unknown".into())
}
