//! Era-scanner policy — checkpoint-driven catch-up of every finished era.
//!
//! A trigger forwarder turns startup, era-change events and an optional
//! periodic tick into [`ScanTrigger`]s. The [`ScanCoordinator`] runs the
//! [`EraScanner`] single-flight for them. Each pass exports every era between
//! the checkpoint and the active era, advancing the checkpoint one era at a
//! time after that era's files were exported and uploaded.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::time::{Instant, Interval};

use eraexport_core::checkpoint::{CheckpointManager, CheckpointStore, FileCheckpointStore};
use eraexport_core::chunk::ChunkSize;
use eraexport_core::config::ExporterConfig;
use eraexport_core::coordinator::{
    ScanBody, ScanCoordinator, ScanHandle, ScanTrigger, TriggerDelivery,
};
use eraexport_core::error::{RetryError, ScanError};
use eraexport_core::provider::{ChainDataProvider, EpochChangeStream};
use eraexport_core::retry::RetryingCaller;
use eraexport_core::types::{EpochChange, EraIndex, ExportRequest};

use crate::error::{SchedulerError, Shutdown};
use crate::export::Exporter;

// ─── EraScanner ───────────────────────────────────────────────────────────────

/// Scan body: exports finished eras past the checkpoint.
pub struct EraScanner {
    provider: Arc<dyn ChainDataProvider>,
    exporter: Exporter,
    checkpoint: CheckpointManager,
    chunk_size: ChunkSize,
}

impl EraScanner {
    pub fn new(
        provider: Arc<dyn ChainDataProvider>,
        exporter: Exporter,
        store: Box<dyn CheckpointStore>,
        chunk_size: ChunkSize,
    ) -> Self {
        Self {
            provider,
            exporter,
            checkpoint: CheckpointManager::new(store),
            chunk_size,
        }
    }

    /// Load or seed the checkpoint. Returns the active era and the checkpoint.
    pub async fn initialise(
        &mut self,
        start_from: Option<EraIndex>,
    ) -> Result<(EraIndex, EraIndex), SchedulerError> {
        let active_era = self.active_era().await?;
        let checkpoint = self.checkpoint.initialise(active_era, start_from).await?;
        Ok((active_era, checkpoint))
    }

    async fn active_era(&self) -> Result<EraIndex, RetryError> {
        let provider = &self.provider;
        self.exporter
            .retry()
            .call("active_era", || provider.active_era())
            .await
    }
}

#[async_trait]
impl ScanBody for EraScanner {
    async fn scan(&mut self) -> Result<(), ScanError> {
        let active_era = self.active_era().await?;
        let mut checkpoint = self.checkpoint.read().await?;
        tracing::info!(checkpoint, active_era, "Scanning for unexported eras");

        // the active era is still in progress; everything before it is final
        while checkpoint.saturating_add(1) < active_era {
            let era = checkpoint + 1;
            let request = ExportRequest::Catchup {
                era,
                chunk_size: self.chunk_size,
            };
            self.exporter.export(request).await?;
            self.exporter.upload().await?;
            self.checkpoint.advance(era).await?;
            checkpoint = era;
        }
        Ok(())
    }

    fn last_checkpoint(&self) -> Option<EraIndex> {
        self.checkpoint.last_known()
    }
}

// ─── CatchupPolicy ────────────────────────────────────────────────────────────

/// Options for the era-scanner policy, resolved from the config.
#[derive(Debug, Clone)]
pub struct CatchupOptions {
    pub chunk_size: ChunkSize,
    pub start_from_era: Option<EraIndex>,
    pub rescan_interval: Option<Duration>,
    pub queue_capacity: usize,
}

impl CatchupOptions {
    pub fn from_config(config: &ExporterConfig) -> Result<Self, SchedulerError> {
        Ok(Self {
            chunk_size: config.chunk_size()?,
            start_from_era: config.era_scanner.start_from_era,
            rescan_interval: config
                .era_scanner
                .rescan_interval_secs
                .map(Duration::from_secs),
            queue_capacity: config.trigger_queue_capacity,
        })
    }
}

/// Checkpoint store named by the `eraScanner` config section.
pub fn checkpoint_store(config: &ExporterConfig) -> FileCheckpointStore {
    FileCheckpointStore::new(
        &config.era_scanner.data_dir,
        &config.era_scanner.checkpoint_file_name,
    )
}

/// Runs the trigger forwarder and the scan coordinator together.
pub struct CatchupPolicy {
    provider: Arc<dyn ChainDataProvider>,
    scanner: EraScanner,
    options: CatchupOptions,
}

impl CatchupPolicy {
    pub fn new(
        provider: Arc<dyn ChainDataProvider>,
        exporter: Exporter,
        store: Box<dyn CheckpointStore>,
        options: CatchupOptions,
    ) -> Self {
        Self {
            scanner: EraScanner::new(Arc::clone(&provider), exporter, store, options.chunk_size),
            provider,
            options,
        }
    }

    /// Run until the era-change subscription ends and the last queued scan
    /// has finished, or until a scan fails.
    ///
    /// A failing trigger source never cancels a running scan: the queued
    /// scans are finished first and the trigger error is returned after.
    pub async fn run(mut self) -> Result<Shutdown, SchedulerError> {
        let (active_era, checkpoint) = self
            .scanner
            .initialise(self.options.start_from_era)
            .await?;
        tracing::info!(active_era, checkpoint, "Era scanner policy started");

        let (mut coordinator, handle) = ScanCoordinator::channel(self.options.queue_capacity);
        let (scanned, trigger_error) = {
            let forward = forward_triggers(
                Arc::clone(&self.provider),
                self.scanner.exporter.retry().clone(),
                handle,
                active_era,
                self.options.rescan_interval,
            );
            tokio::pin!(forward);
            let scan = coordinator.run(&mut self.scanner);
            tokio::pin!(scan);

            let mut forwarding = true;
            let mut trigger_error = None;
            let scanned = loop {
                tokio::select! {
                    res = &mut scan => break res,
                    res = &mut forward, if forwarding => {
                        forwarding = false;
                        if let Err(e) = res {
                            tracing::error!(
                                error = %e,
                                "Scan triggers failed, finishing queued scans"
                            );
                            trigger_error = Some(e);
                        }
                    }
                }
            };
            (scanned, trigger_error)
        };

        let passes = scanned?;
        if let Some(e) = trigger_error {
            tracing::error!(
                passes,
                last_checkpoint = ?self.scanner.last_checkpoint(),
                error = %e,
                "Era scanner stopped after trigger failure"
            );
            return Err(e);
        }
        tracing::info!(passes, "Era scanner stopped");
        Ok(Shutdown::StreamEnded)
    }
}

/// Feed scan triggers until the era-change subscription ends. Dropping
/// `handle` on return lets the coordinator drain and stop.
async fn forward_triggers(
    provider: Arc<dyn ChainDataProvider>,
    retry: RetryingCaller,
    handle: ScanHandle,
    mut last_seen_era: EraIndex,
    rescan_interval: Option<Duration>,
) -> Result<(), SchedulerError> {
    if handle.request_scan(ScanTrigger::Startup) == TriggerDelivery::Closed {
        return Ok(());
    }

    let mut periodic =
        rescan_interval.map(|period| tokio::time::interval_at(Instant::now() + period, period));
    let mut changes = subscribe(&provider, &retry).await?;
    loop {
        let trigger = tokio::select! {
            item = changes.next() => match item {
                None => {
                    tracing::info!("Era change subscription ended");
                    return Ok(());
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Era change subscription failed, resubscribing");
                    changes = subscribe(&provider, &retry).await?;
                    continue;
                }
                Some(Ok(EpochChange::NewEra(era))) if era > last_seen_era => {
                    last_seen_era = era;
                    tracing::info!(era, "New era");
                    ScanTrigger::EraChanged(era)
                }
                Some(Ok(_)) => continue,
            },
            _ = tick(&mut periodic) => ScanTrigger::Periodic,
        };

        if handle.request_scan(trigger) == TriggerDelivery::Closed {
            return Ok(());
        }
    }
}

async fn subscribe(
    provider: &Arc<dyn ChainDataProvider>,
    retry: &RetryingCaller,
) -> Result<EpochChangeStream, SchedulerError> {
    Ok(retry
        .call("subscribe_epoch_changes", || provider.subscribe_epoch_changes())
        .await?)
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
