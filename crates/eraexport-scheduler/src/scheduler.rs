//! Scheduler entry point — picks the run mode and drives it to completion.

use std::sync::Arc;

use eraexport_core::config::ExporterConfig;
use eraexport_core::provider::{ArtifactUploader, ChainDataProvider, ExportPipeline};
use eraexport_core::retry::RetryingCaller;

use crate::catchup::{self, CatchupOptions, CatchupPolicy};
use crate::error::{SchedulerError, Shutdown};
use crate::export::Exporter;
use crate::head::{HeadOptions, HeadPolicy};

/// Which policy drives exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Checkpoint-driven catch-up of finished eras.
    EraScanner,
    /// Near-real-time exports from the new-heads subscription.
    HeadSubscription,
}

impl Mode {
    pub fn from_config(config: &ExporterConfig) -> Self {
        if config.era_scanner.enabled {
            Self::EraScanner
        } else {
            Self::HeadSubscription
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EraScanner => write!(f, "era-scanner"),
            Self::HeadSubscription => write!(f, "head-subscription"),
        }
    }
}

/// The external services the scheduler drives.
#[derive(Clone)]
pub struct Collaborators {
    pub provider: Arc<dyn ChainDataProvider>,
    pub pipeline: Arc<dyn ExportPipeline>,
    /// `None` disables uploads.
    pub uploader: Option<Arc<dyn ArtifactUploader>>,
}

/// A configured scheduler, ready to run.
pub struct Scheduler {
    config: ExporterConfig,
    collaborators: Collaborators,
}

impl Scheduler {
    /// Validate `config` and bind it to the collaborators.
    pub fn new(
        config: ExporterConfig,
        collaborators: Collaborators,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self {
            config,
            collaborators,
        })
    }

    pub fn mode(&self) -> Mode {
        Mode::from_config(&self.config)
    }

    /// Run until a clean shutdown or the first unrecoverable failure.
    pub async fn run(self) -> Result<Shutdown, SchedulerError> {
        let mode = self.mode();
        let result = self.run_mode(mode).await;
        match &result {
            Ok(shutdown) => tracing::info!(%mode, ?shutdown, "Scheduler stopped"),
            Err(e) => tracing::error!(%mode, error = %e, "Scheduler failed"),
        }
        result
    }

    async fn run_mode(self, mode: Mode) -> Result<Shutdown, SchedulerError> {
        let Self {
            config,
            collaborators,
        } = self;
        let exporter = Exporter::new(
            collaborators.pipeline,
            collaborators.uploader,
            RetryingCaller::new(config.retry.clone()),
            config.export_dir.clone(),
        );

        tracing::info!(
            %mode,
            export_dir = %config.export_dir.display(),
            threshold = config.end_session_block_distance,
            "Scheduler starting"
        );
        match collaborators.provider.chain_name().await {
            Ok(chain) => tracing::info!(chain = %chain, "Connected"),
            Err(e) => tracing::warn!(error = %e, "Could not read chain name"),
        }
        exporter.prepare_export_dir().await?;

        match mode {
            Mode::EraScanner => {
                let store = Box::new(catchup::checkpoint_store(&config));
                CatchupPolicy::new(
                    collaborators.provider,
                    exporter,
                    store,
                    CatchupOptions::from_config(&config)?,
                )
                .run()
                .await
            }
            Mode::HeadSubscription => {
                let options = HeadOptions::from_config(&config)?;
                HeadPolicy::new(collaborators.provider, exporter, options)
                    .run()
                    .await
            }
        }
    }
}

/// Validate the config, then run the mode it selects.
pub async fn start(
    config: ExporterConfig,
    collaborators: Collaborators,
) -> Result<Shutdown, SchedulerError> {
    Scheduler::new(config, collaborators)?.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_follows_era_scanner_flag() {
        let mut cfg = ExporterConfig::default();
        assert_eq!(Mode::from_config(&cfg), Mode::HeadSubscription);
        cfg.era_scanner.enabled = true;
        assert_eq!(Mode::from_config(&cfg), Mode::EraScanner);
        assert_eq!(Mode::EraScanner.to_string(), "era-scanner");
    }
}
