//! Checkpoint store — persists the highest fully exported era for crash
//! recovery.
//!
//! The checkpoint advances one era at a time and only after that era has been
//! exported and uploaded, so a restart resumes at the first era that was not
//! exported yet.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::CheckpointError;
use crate::types::EraIndex;

/// Trait for reading and writing the era checkpoint.
///
/// Implementations include [`FileCheckpointStore`] and [`MemoryCheckpointStore`].
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Read the checkpoint (returns `None` if none was ever written).
    async fn read(&self) -> Result<Option<EraIndex>, CheckpointError>;

    /// Overwrite the checkpoint.
    async fn write(&self, era: EraIndex) -> Result<(), CheckpointError>;

    /// Human-readable location, for logs.
    fn location(&self) -> String;
}

// ─── File store ───────────────────────────────────────────────────────────────

/// Checkpoint kept in a single file whose only content is the era index as a
/// decimal string.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    /// Store at `{data_dir}/{file_name}`.
    pub fn new(data_dir: impl AsRef<Path>, file_name: &str) -> Self {
        Self {
            path: data_dir.as_ref().join(file_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Parse checkpoint file content. Surrounding whitespace (including a
/// trailing newline) is ignored and an empty file counts as no checkpoint.
pub fn parse_checkpoint(path: &Path, content: &str) -> Result<Option<EraIndex>, CheckpointError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<EraIndex>()
        .map(Some)
        .map_err(|_| CheckpointError::Corrupt {
            path: path.to_path_buf(),
            content: content.to_string(),
        })
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn read(&self) -> Result<Option<EraIndex>, CheckpointError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => parse_checkpoint(&self.path, &content),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn write(&self, era: EraIndex) -> Result<(), CheckpointError> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        // write-then-rename so a crash never leaves a half-written checkpoint
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, era.to_string())
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

/// In-memory checkpoint store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    value: Mutex<Option<EraIndex>>,
    history: Mutex<Vec<EraIndex>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing checkpoint.
    pub fn with_value(era: EraIndex) -> Self {
        Self {
            value: Mutex::new(Some(era)),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Every value written so far, oldest first.
    pub fn history(&self) -> Vec<EraIndex> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn read(&self) -> Result<Option<EraIndex>, CheckpointError> {
        Ok(*self.value.lock().unwrap_or_else(PoisonError::into_inner))
    }

    async fn write(&self, era: EraIndex) -> Result<(), CheckpointError> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(era);
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(era);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".into()
    }
}

#[async_trait]
impl<S: CheckpointStore + ?Sized> CheckpointStore for std::sync::Arc<S> {
    async fn read(&self) -> Result<Option<EraIndex>, CheckpointError> {
        (**self).read().await
    }

    async fn write(&self, era: EraIndex) -> Result<(), CheckpointError> {
        (**self).write(era).await
    }

    fn location(&self) -> String {
        (**self).location()
    }
}

// ─── CheckpointManager ────────────────────────────────────────────────────────

/// Seeds, reads and advances the era checkpoint.
pub struct CheckpointManager {
    store: Box<dyn CheckpointStore>,
    /// Last value read or written, kept for failure diagnostics.
    last_known: Option<EraIndex>,
}

impl CheckpointManager {
    pub fn new(store: Box<dyn CheckpointStore>) -> Self {
        Self {
            store,
            last_known: None,
        }
    }

    /// Load the checkpoint, seeding it when absent.
    ///
    /// The seed is `start_from` when configured, otherwise `active_era - 1`.
    /// With no configured seed and an active era of 0 there is nothing safe
    /// to seed from, which is an error rather than a silent default. A
    /// configured seed must be a finished era, i.e. below `active_era`.
    pub async fn initialise(
        &mut self,
        active_era: EraIndex,
        start_from: Option<EraIndex>,
    ) -> Result<EraIndex, CheckpointError> {
        if let Some(era) = self.store.read().await? {
            tracing::info!(era, location = %self.store.location(), "Resuming from checkpoint");
            self.last_known = Some(era);
            return Ok(era);
        }

        let seed = match start_from {
            Some(era) if era >= active_era => {
                return Err(CheckpointError::SeedAhead {
                    seed: era,
                    active_era,
                });
            }
            Some(era) => era,
            None => active_era.checked_sub(1).ok_or(CheckpointError::Unseedable)?,
        };
        self.store.write(seed).await?;
        tracing::info!(
            seed,
            active_era,
            configured = start_from.is_some(),
            location = %self.store.location(),
            "Checkpoint seeded"
        );
        self.last_known = Some(seed);
        Ok(seed)
    }

    /// Read the current checkpoint from the store.
    pub async fn read(&mut self) -> Result<EraIndex, CheckpointError> {
        let era = self.store.read().await?.ok_or(CheckpointError::Uninitialised)?;
        self.last_known = Some(era);
        Ok(era)
    }

    /// Record `era` as exported. It must be exactly one past the current checkpoint.
    pub async fn advance(&mut self, era: EraIndex) -> Result<(), CheckpointError> {
        let current = self.read().await?;
        if current.checked_add(1) != Some(era) {
            return Err(CheckpointError::NonMonotonic { current, next: era });
        }
        self.store.write(era).await?;
        self.last_known = Some(era);
        tracing::info!(era, "Checkpoint advanced");
        Ok(())
    }

    /// The last checkpoint value seen, without touching the store.
    pub fn last_known(&self) -> Option<EraIndex> {
        self.last_known
    }
}
