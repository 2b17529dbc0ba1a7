//! Shared types for the export scheduling pipeline.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chunk::ChunkSize;

/// Staking era index (coarse epoch, spans several sessions).
pub type EraIndex = u32;

/// Session index (fine epoch, nested in an era).
pub type SessionIndex = u32;

/// Block height.
pub type BlockNumber = u64;

// ─── EpochProgress ────────────────────────────────────────────────────────────

/// Snapshot of how far the chain has progressed into the current session and era.
///
/// Progress counts are blocks elapsed in the epoch, lengths are the total
/// number of blocks in the epoch, so `0 ≤ progress ≤ length` holds for
/// well-formed telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochProgress {
    pub current_session: SessionIndex,
    pub current_era: EraIndex,
    pub active_era: EraIndex,
    pub session_length: BlockNumber,
    pub session_progress: BlockNumber,
    pub era_length: BlockNumber,
    pub era_progress: BlockNumber,
}

impl EpochProgress {
    /// Blocks left before the current session ends.
    pub fn session_blocks_remaining(&self) -> BlockNumber {
        self.session_length.saturating_sub(self.session_progress)
    }

    /// Blocks left before the current era ends.
    pub fn era_blocks_remaining(&self) -> BlockNumber {
        self.era_length.saturating_sub(self.era_progress)
    }

    /// Returns `true` if both progress counters are within their lengths.
    pub fn is_well_formed(&self) -> bool {
        self.session_progress <= self.session_length && self.era_progress <= self.era_length
    }
}

// ─── Chain notifications ──────────────────────────────────────────────────────

/// A new chain head as delivered by the head subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block number.
    pub number: BlockNumber,
    /// Block hash (`0x…`).
    pub hash: String,
}

/// An epoch-change event emitted by the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpochChange {
    NewEra(EraIndex),
    NewSession(SessionIndex),
}

// ─── Export requests ──────────────────────────────────────────────────────────

/// A request handed to the export pipeline. Each variant carries exactly
/// the fields its export needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportRequest {
    /// End-of-era export: session files plus the era file.
    Era {
        era: EraIndex,
        session: SessionIndex,
        block: BlockNumber,
        chunk_size: ChunkSize,
    },
    /// End-of-session export: session files only.
    Session {
        era: EraIndex,
        session: SessionIndex,
        block: BlockNumber,
        chunk_size: ChunkSize,
    },
    /// Backfill export of a single finalised era (catch-up scanner).
    Catchup {
        era: EraIndex,
        chunk_size: ChunkSize,
    },
    /// Backfill export of a window of past eras.
    Historic { eras: Vec<EraIndex> },
}

impl fmt::Display for ExportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Era { era, session, block, .. } => {
                write!(f, "era {era} (session {session}, block {block})")
            }
            Self::Session { era, session, block, .. } => {
                write!(f, "session {session} (era {era}, block {block})")
            }
            Self::Catchup { era, .. } => write!(f, "catch-up era {era}"),
            Self::Historic { eras } => {
                let list: Vec<String> = eras.iter().map(|e| e.to_string()).collect();
                write!(f, "historic eras [{}]", list.join(", "))
            }
        }
    }
}

/// Result of a completed export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportArtifact {
    /// Files written by the pipeline.
    pub files: Vec<PathBuf>,
    /// When the export finished.
    pub exported_at: DateTime<Utc>,
}

impl ExportArtifact {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            exported_at: Utc::now(),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
