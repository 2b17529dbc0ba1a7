//! Collaborator traits — the chain-data provider, the export pipeline and
//! the artifact uploader.
//!
//! The scheduling core decides *when* to export; these traits do the chain
//! queries, CSV writing and object-storage upload.

use std::path::Path;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::ProviderError;
use crate::types::{
    BlockHeader, EpochChange, EpochProgress, EraIndex, ExportArtifact, ExportRequest,
};

/// A stream of new chain heads.
pub type HeaderStream = BoxStream<'static, Result<BlockHeader, ProviderError>>;

/// A stream of era/session change events.
pub type EpochChangeStream = BoxStream<'static, Result<EpochChange, ProviderError>>;

/// Read access to the chain.
#[async_trait]
pub trait ChainDataProvider: Send + Sync {
    /// Chain name (e.g. `"polkadot"`), used to name export files.
    async fn chain_name(&self) -> Result<String, ProviderError>;

    /// Current session/era progress.
    async fn current_epoch_progress(&self) -> Result<EpochProgress, ProviderError>;

    /// Index of the active era.
    async fn active_era(&self) -> Result<EraIndex, ProviderError> {
        Ok(self.current_epoch_progress().await?.active_era)
    }

    /// Eras the chain still keeps staking history for, oldest first.
    async fn historic_eras(&self) -> Result<Vec<EraIndex>, ProviderError>;

    /// The latest chain head.
    async fn current_head(&self) -> Result<BlockHeader, ProviderError>;

    /// Subscribe to new chain heads.
    async fn subscribe_new_heads(&self) -> Result<HeaderStream, ProviderError>;

    /// Subscribe to era/session change events.
    async fn subscribe_epoch_changes(&self) -> Result<EpochChangeStream, ProviderError>;
}

/// Gathers chain data for a request and writes the export files.
#[async_trait]
pub trait ExportPipeline: Send + Sync {
    async fn export(&self, request: &ExportRequest) -> Result<ExportArtifact, ProviderError>;
}

/// Uploads completed export files.
#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    /// Upload every file in `dir`.
    async fn upload_dir(&self, dir: &Path) -> Result<(), ProviderError>;
}
