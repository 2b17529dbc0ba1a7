//! Scripted chain, pipeline and uploader shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use eraexport_core::error::ProviderError;
use eraexport_core::provider::{
    ArtifactUploader, ChainDataProvider, EpochChangeStream, ExportPipeline, HeaderStream,
};
use eraexport_core::retry::RetryConfig;
use eraexport_core::types::{
    BlockHeader, BlockNumber, EpochChange, EpochProgress, EraIndex, ExportArtifact, ExportRequest,
    SessionIndex,
};
use eraexport_scheduler::Collaborators;

// ─── Helpers ──────────────────────────────────────────────────────────────────

pub const SESSION_LENGTH: BlockNumber = 600;
pub const ERA_LENGTH: BlockNumber = 3_600;

/// Progress snapshot with `current_era == active_era`.
pub fn progress(
    session: SessionIndex,
    era: EraIndex,
    session_progress: BlockNumber,
    era_progress: BlockNumber,
) -> EpochProgress {
    EpochProgress {
        current_session: session,
        current_era: era,
        active_era: era,
        session_length: SESSION_LENGTH,
        session_progress,
        era_length: ERA_LENGTH,
        era_progress,
    }
}

pub fn header(number: BlockNumber) -> BlockHeader {
    BlockHeader {
        number,
        hash: format!("0x{number:064x}"),
    }
}

/// Retry settings that keep the tests fast.
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        delay_ms: 1,
        max_delay_ms: 1,
        ..RetryConfig::default()
    }
}

// ─── MockChain ────────────────────────────────────────────────────────────────

/// Chain whose progress snapshots are consumed one per query; the last one
/// is repeated forever.
#[derive(Default)]
pub struct MockChain {
    progress: Mutex<VecDeque<EpochProgress>>,
    heads: Mutex<Option<Vec<BlockHeader>>>,
    changes: Mutex<Option<Vec<EpochChange>>>,
    /// Keep the era-change stream open after the scripted events.
    changes_endless: bool,
    /// Drop the era-change stream after this long and refuse to resubscribe.
    changes_fail_after: Option<Duration>,
    change_subscriptions: AtomicUsize,
    historic: Vec<EraIndex>,
    progress_queries: AtomicUsize,
}

impl MockChain {
    pub fn new(progress: Vec<EpochProgress>) -> Self {
        Self {
            progress: Mutex::new(progress.into()),
            ..Self::default()
        }
    }

    pub fn with_heads(self, heads: Vec<BlockHeader>) -> Self {
        *self.heads.lock().unwrap() = Some(heads);
        self
    }

    pub fn with_changes(self, changes: Vec<EpochChange>) -> Self {
        *self.changes.lock().unwrap() = Some(changes);
        self
    }

    pub fn with_endless_changes(mut self, changes: Vec<EpochChange>) -> Self {
        self.changes_endless = true;
        self.with_changes(changes)
    }

    pub fn with_failing_changes(mut self, after: Duration) -> Self {
        self.changes_fail_after = Some(after);
        self
    }

    pub fn with_historic(mut self, eras: Vec<EraIndex>) -> Self {
        self.historic = eras;
        self
    }

    pub fn progress_queries(&self) -> usize {
        self.progress_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainDataProvider for MockChain {
    async fn chain_name(&self) -> Result<String, ProviderError> {
        Ok("testnet".into())
    }

    async fn current_epoch_progress(&self) -> Result<EpochProgress, ProviderError> {
        self.progress_queries.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.progress.lock().unwrap();
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().copied()
        };
        next.ok_or_else(|| ProviderError::Other("no progress scripted".into()))
    }

    async fn historic_eras(&self) -> Result<Vec<EraIndex>, ProviderError> {
        Ok(self.historic.clone())
    }

    async fn current_head(&self) -> Result<BlockHeader, ProviderError> {
        Ok(header(1_000))
    }

    async fn subscribe_new_heads(&self) -> Result<HeaderStream, ProviderError> {
        let heads = self.heads.lock().unwrap().take().unwrap_or_default();
        Ok(futures::stream::iter(heads.into_iter().map(Ok)).boxed())
    }

    async fn subscribe_epoch_changes(&self) -> Result<EpochChangeStream, ProviderError> {
        let attempt = self.change_subscriptions.fetch_add(1, Ordering::SeqCst);
        if let Some(after) = self.changes_fail_after {
            if attempt > 0 {
                return Err(ProviderError::Fatal("subscription rejected".into()));
            }
            return Ok(futures::stream::once(async move {
                tokio::time::sleep(after).await;
                Err::<EpochChange, _>(ProviderError::Connection("subscription dropped".into()))
            })
            .boxed());
        }

        let changes = self.changes.lock().unwrap().take().unwrap_or_default();
        let scripted = futures::stream::iter(changes.into_iter().map(Ok));
        if self.changes_endless {
            Ok(scripted.chain(futures::stream::pending()).boxed())
        } else {
            Ok(scripted.boxed())
        }
    }
}

// ─── RecordingPipeline ────────────────────────────────────────────────────────

/// Records every finished request. Optionally snapshots the checkpoint file
/// at export time, takes a while per export, or fails fatally on one
/// catch-up era.
#[derive(Default)]
pub struct RecordingPipeline {
    requests: Mutex<Vec<ExportRequest>>,
    started: AtomicUsize,
    checkpoint_file: Option<PathBuf>,
    checkpoints_seen: Mutex<Vec<String>>,
    fail_on_era: Option<EraIndex>,
    delay: Option<Duration>,
}

impl RecordingPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watching(checkpoint_file: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_file: Some(checkpoint_file.into()),
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, era: EraIndex) -> Self {
        self.fail_on_era = Some(era);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Exports begun, finished or not.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ExportRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Checkpoint file content at the time of each export.
    pub fn checkpoints_seen(&self) -> Vec<String> {
        self.checkpoints_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExportPipeline for RecordingPipeline {
    async fn export(&self, request: &ExportRequest) -> Result<ExportArtifact, ProviderError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let (Some(fail), ExportRequest::Catchup { era, .. }) = (self.fail_on_era, request) {
            if fail == *era {
                let message = format!("bad signature while exporting era {era}");
                return Err(ProviderError::Fatal(message));
            }
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(path) = &self.checkpoint_file {
            let seen = std::fs::read_to_string(path).unwrap_or_default();
            self.checkpoints_seen.lock().unwrap().push(seen);
        }
        self.requests.lock().unwrap().push(request.clone());
        Ok(ExportArtifact::new(vec![PathBuf::from(format!("{request}.csv"))]))
    }
}

// ─── CountingUploader ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct CountingUploader {
    uploads: AtomicUsize,
}

impl CountingUploader {
    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactUploader for CountingUploader {
    async fn upload_dir(&self, _dir: &Path) -> Result<(), ProviderError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn collaborators(
    chain: &Arc<MockChain>,
    pipeline: &Arc<RecordingPipeline>,
    uploader: &Arc<CountingUploader>,
) -> Collaborators {
    Collaborators {
        provider: chain.clone(),
        pipeline: pipeline.clone(),
        uploader: Some(uploader.clone()),
    }
}
