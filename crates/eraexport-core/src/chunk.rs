//! Chunking helper — bounds how many items go into a single upstream call.
//!
//! An unbounded address or era list can exceed the node's request-size or
//! buffer limits, so call sites split it with [`chunk`] first.

use std::fmt;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A validated, non-zero chunk size.
///
/// Zero is rejected when the configuration is loaded, so [`chunk`] itself
/// is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct ChunkSize(NonZeroUsize);

impl ChunkSize {
    pub fn new(size: usize) -> Result<Self, ConfigError> {
        NonZeroUsize::new(size).map(Self).ok_or_else(|| ConfigError::Invalid {
            field: "apiChunkSize",
            reason: "must be greater than 0".into(),
        })
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl TryFrom<usize> for ChunkSize {
    type Error = ConfigError;

    fn try_from(size: usize) -> Result<Self, Self::Error> {
        Self::new(size)
    }
}

impl From<ChunkSize> for usize {
    fn from(size: ChunkSize) -> Self {
        size.get()
    }
}

impl fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Split `items` into consecutive chunks of `size`. The last chunk may be
/// shorter; an empty input yields no chunks.
pub fn chunk<T: Clone>(items: &[T], size: ChunkSize) -> Vec<Vec<T>> {
    items.chunks(size.get()).map(<[T]>::to_vec).collect()
}
