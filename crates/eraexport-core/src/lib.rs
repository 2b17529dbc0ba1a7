//! eraexport-core — scheduling core for staking era/session exports.
//!
//! # Architecture
//!
//! ```text
//! chain heads ──▶ BoundaryTracker ──▶ head policy ──▶ ExportPipeline
//! era events  ──▶ ScanHandle ──▶ ScanCoordinator ──▶ catch-up scan body
//!                                                       ├── RetryingCaller (upstream calls)
//!                                                       ├── ExportPipeline / ArtifactUploader
//!                                                       └── CheckpointManager (crash recovery)
//! ```

pub mod boundary;
pub mod checkpoint;
pub mod chunk;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod provider;
pub mod retry;
pub mod types;

pub use boundary::{Boundary, BoundaryState, BoundaryTracker, Observation, Transition};
pub use checkpoint::{
    CheckpointManager, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore,
};
pub use chunk::{chunk, ChunkSize};
pub use config::ExporterConfig;
pub use coordinator::{ScanBody, ScanCoordinator, ScanHandle, ScanPhase, ScanTrigger};
pub use error::{CheckpointError, ConfigError, ProviderError, RetryError, ScanError, ScanFailure};
pub use provider::{ArtifactUploader, ChainDataProvider, ExportPipeline};
pub use retry::{RetryConfig, RetryPolicy, RetryingCaller};
pub use types::{
    BlockHeader, BlockNumber, EpochChange, EpochProgress, EraIndex, ExportArtifact,
    ExportRequest, SessionIndex,
};
