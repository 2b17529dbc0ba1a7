//! Export and upload calls, guarded by the retrying caller.

use std::path::PathBuf;
use std::sync::Arc;

use eraexport_core::error::RetryError;
use eraexport_core::provider::{ArtifactUploader, ExportPipeline};
use eraexport_core::retry::RetryingCaller;
use eraexport_core::types::{ExportArtifact, ExportRequest};

use crate::error::SchedulerError;

/// Runs export requests and uploads the export directory.
#[derive(Clone)]
pub struct Exporter {
    pipeline: Arc<dyn ExportPipeline>,
    uploader: Option<Arc<dyn ArtifactUploader>>,
    retry: RetryingCaller,
    export_dir: PathBuf,
}

impl Exporter {
    pub fn new(
        pipeline: Arc<dyn ExportPipeline>,
        uploader: Option<Arc<dyn ArtifactUploader>>,
        retry: RetryingCaller,
        export_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pipeline,
            uploader,
            retry,
            export_dir: export_dir.into(),
        }
    }

    pub fn retry(&self) -> &RetryingCaller {
        &self.retry
    }

    /// Run one export. Exports are idempotent, so a failed attempt is simply
    /// run again.
    pub async fn export(&self, request: ExportRequest) -> Result<ExportArtifact, RetryError> {
        tracing::info!(%request, "Export started");
        let pipeline = &self.pipeline;
        let artifact = self
            .retry
            .call(&request.to_string(), || pipeline.export(&request))
            .await?;
        tracing::info!(%request, files = artifact.files.len(), "Export finished");
        Ok(artifact)
    }

    /// Upload the export directory, if an uploader is configured.
    pub async fn upload(&self) -> Result<(), RetryError> {
        let Some(uploader) = &self.uploader else {
            return Ok(());
        };
        let dir = self.export_dir.as_path();
        self.retry.call("upload", || uploader.upload_dir(dir)).await?;
        tracing::info!(dir = %dir.display(), "Export directory uploaded");
        Ok(())
    }

    /// Create the export directory and upload whatever a previous run left in it.
    pub async fn prepare_export_dir(&self) -> Result<(), SchedulerError> {
        let io_err = |source| SchedulerError::ExportDir {
            path: self.export_dir.clone(),
            source,
        };
        tokio::fs::create_dir_all(&self.export_dir)
            .await
            .map_err(io_err)?;

        let mut entries = tokio::fs::read_dir(&self.export_dir)
            .await
            .map_err(io_err)?;
        let leftovers = entries.next_entry().await.map_err(io_err)?.is_some();
        if leftovers && self.uploader.is_some() {
            tracing::info!(
                dir = %self.export_dir.display(),
                "Uploading files left by a previous run"
            );
            self.upload().await?;
        }
        Ok(())
    }
}
