//! Error types raised by repository implementations.

use raid_core::RaidId;
use thiserror::Error;

/// Errors surfaced by repository implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("raid repository lock was poisoned")]
    LockPoisoned,

    #[error("{raid_id} not found")]
    RaidNotFound { raid_id: RaidId },

    #[error("{raid_id} already exists")]
    RaidExists { raid_id: RaidId },

    /// Optimistic commit lost the race; the caller should reload and retry.
    #[error("{raid_id} version conflict: expected {expected}, found {actual}")]
    VersionConflict {
        raid_id: RaidId,
        expected: u64,
        actual: u64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

impl RepositoryError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
