//! Head-subscription policy — exports near-real-time as each session or era
//! approaches its end.
//!
//! For every new chain head the policy re-reads epoch progress and feeds it
//! to the [`BoundaryTracker`]. Inside a boundary window the first head takes
//! the [`WriteLock`] and runs the export; later heads in the same window see
//! the lock held and do nothing. The lock is released once the tracker
//! confirms the move into the next session (or era).

use std::sync::Arc;

use futures::StreamExt;

use eraexport_core::boundary::{Boundary, BoundaryState, BoundaryTracker};
use eraexport_core::chunk::ChunkSize;
use eraexport_core::config::ExporterConfig;
use eraexport_core::provider::{ChainDataProvider, HeaderStream};
use eraexport_core::types::{BlockHeader, BlockNumber, EpochProgress, ExportRequest};

use crate::error::{SchedulerError, Shutdown};
use crate::export::Exporter;
use crate::historic;

/// Guards against more than one head-triggered export per boundary window.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteLock {
    held: bool,
}

impl WriteLock {
    /// Take the lock. Returns `false` if it was already held.
    pub fn try_acquire(&mut self) -> bool {
        if self.held {
            false
        } else {
            self.held = true;
            true
        }
    }

    pub fn release(&mut self) {
        self.held = false;
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}

/// Options for the head-subscription policy, resolved from the config.
#[derive(Debug, Clone)]
pub struct HeadOptions {
    pub threshold: BlockNumber,
    pub chunk_size: ChunkSize,
    pub session_only: bool,
    pub force_initial_write: bool,
    /// Export this many past eras at startup, then stop.
    pub history_size: Option<usize>,
    /// Stop after the first upload.
    pub stop_after_upload: bool,
}

impl HeadOptions {
    pub fn from_config(config: &ExporterConfig) -> Result<Self, SchedulerError> {
        Ok(Self {
            threshold: config.end_session_block_distance,
            chunk_size: config.chunk_size()?,
            session_only: config.session_only,
            force_initial_write: config.debug.enabled && config.debug.force_initial_write,
            history_size: config
                .historic
                .enabled
                .then_some(config.historic.history_size),
            stop_after_upload: config.cronjob.enabled,
        })
    }
}

/// Drives exports from the new-heads subscription.
pub struct HeadPolicy {
    provider: Arc<dyn ChainDataProvider>,
    exporter: Exporter,
    options: HeadOptions,
    write_lock: WriteLock,
    uploadable: bool,
}

impl HeadPolicy {
    pub fn new(
        provider: Arc<dyn ChainDataProvider>,
        exporter: Exporter,
        options: HeadOptions,
    ) -> Self {
        Self {
            provider,
            exporter,
            options,
            write_lock: WriteLock::default(),
            uploadable: false,
        }
    }

    /// Run until the head subscription ends, a one-shot job completes, or a
    /// failure escapes the retrying caller.
    pub async fn run(mut self) -> Result<Shutdown, SchedulerError> {
        let progress = self.epoch_progress().await?;
        let initial = BoundaryState::from_progress(&progress);
        let mut tracker = BoundaryTracker::new(initial, self.options.threshold)
            .session_only(self.options.session_only);
        tracing::info!(
            session = progress.current_session,
            era = progress.active_era,
            threshold = self.options.threshold,
            "Head subscription policy started"
        );

        if self.options.force_initial_write {
            tracing::info!("Debug mode: forcing an initial export");
            let head = self.current_head().await?;
            let request = self.era_request(&progress, head.number);
            self.exporter.export(request).await?;
            self.uploadable = true;
        }

        if let Some(history_size) = self.options.history_size {
            historic::export_history(self.provider.as_ref(), &self.exporter, history_size).await?;
            self.uploadable = true;
        }

        if let Some(shutdown) = self.upload_if_ready().await? {
            return Ok(shutdown);
        }

        let mut heads = self.subscribe().await?;
        tracing::info!("Subscribed to new heads");
        loop {
            match heads.next().await {
                None => {
                    tracing::info!("New heads subscription ended");
                    return Ok(Shutdown::StreamEnded);
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "New heads subscription failed, resubscribing");
                    heads = self.subscribe().await?;
                }
                Some(Ok(header)) => {
                    if let Some(shutdown) = self.on_head(&mut tracker, &header).await? {
                        return Ok(shutdown);
                    }
                }
            }
        }
    }

    /// Handle one new head.
    pub async fn on_head(
        &mut self,
        tracker: &mut BoundaryTracker,
        header: &BlockHeader,
    ) -> Result<Option<Shutdown>, SchedulerError> {
        let progress = self.epoch_progress().await?;
        let observation = tracker.observe(&progress);

        if observation.transition.is_some() && self.write_lock.is_held() {
            self.write_lock.release();
            tracing::debug!(block = header.number, "Write lock released");
        }

        let request = match observation.boundary {
            Boundary::None => return Ok(None),
            Boundary::EraEnd => self.era_request(&progress, header.number),
            Boundary::SessionEnd => self.session_request(&progress, header.number),
        };

        if !self.write_lock.try_acquire() {
            tracing::debug!(block = header.number, "Export for this window already done");
            return Ok(None);
        }

        self.exporter.export(request).await?;
        self.uploadable = true;
        self.upload_if_ready().await
    }

    async fn upload_if_ready(&mut self) -> Result<Option<Shutdown>, SchedulerError> {
        if !self.uploadable {
            return Ok(None);
        }
        self.uploadable = false;
        self.exporter.upload().await?;

        if self.options.stop_after_upload {
            tracing::info!("Cronjob finished");
            return Ok(Some(Shutdown::OneShotComplete));
        }
        if self.options.history_size.is_some() {
            tracing::info!("Historic export finished");
            return Ok(Some(Shutdown::OneShotComplete));
        }
        Ok(None)
    }

    fn era_request(&self, progress: &EpochProgress, block: BlockNumber) -> ExportRequest {
        ExportRequest::Era {
            era: progress.active_era,
            session: progress.current_session,
            block,
            chunk_size: self.options.chunk_size,
        }
    }

    fn session_request(&self, progress: &EpochProgress, block: BlockNumber) -> ExportRequest {
        ExportRequest::Session {
            era: progress.current_era,
            session: progress.current_session,
            block,
            chunk_size: self.options.chunk_size,
        }
    }

    async fn epoch_progress(&self) -> Result<EpochProgress, SchedulerError> {
        let provider = &self.provider;
        Ok(self
            .exporter
            .retry()
            .call("current_epoch_progress", || provider.current_epoch_progress())
            .await?)
    }

    async fn current_head(&self) -> Result<BlockHeader, SchedulerError> {
        let provider = &self.provider;
        Ok(self
            .exporter
            .retry()
            .call("current_head", || provider.current_head())
            .await?)
    }

    async fn subscribe(&self) -> Result<HeaderStream, SchedulerError> {
        let provider = &self.provider;
        Ok(self
            .exporter
            .retry()
            .call("subscribe_new_heads", || provider.subscribe_new_heads())
            .await?)
    }
}
