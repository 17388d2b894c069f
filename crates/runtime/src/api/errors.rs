//! Unified error types surfaced by the runtime API.
//!
//! Wraps failures from the ledger, repositories and reward dispatch so clients
//! can bubble them up with consistent context. Every variant maps to one
//! [`ErrorKind`], which is what callers should branch on.

use raid_core::{InactiveReason, LedgerError, LoadoutError, RaidId, RaidSpecError};
use thiserror::Error;

pub use crate::repository::RepositoryError;
use crate::rewards::RewardError;

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Caller-facing error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// The raid does not exist, or no raid is active.
    NotFound,
    /// The raid is defeated, expired, or outside its window.
    InactiveRaid,
    /// Malformed request; nothing was applied.
    InvalidInput,
    /// Commit retries ran out; nothing was applied and the caller may retry.
    ConcurrencyConflict,
    /// The raid closed but rewards could not be handed off.
    RewardDispatchFailure,
    /// Storage or worker failure.
    Internal,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("{raid_id} not found")]
    RaidNotFound { raid_id: RaidId },

    #[error("no active raid")]
    NoActiveRaid,

    #[error("{raid_id} is not accepting attacks ({reason})")]
    InactiveRaid {
        raid_id: RaidId,
        reason: InactiveReason,
    },

    #[error("invalid loadout: {0}")]
    InvalidLoadout(#[from] LoadoutError),

    #[error("invalid raid spec: {0}")]
    InvalidRaidSpec(#[from] RaidSpecError),

    #[error("{raid_id} is busy: attack not applied after {attempts} attempts, try again")]
    ConcurrencyConflict { raid_id: RaidId, attempts: u32 },

    #[error("reward dispatch for {raid_id} failed")]
    RewardDispatch {
        raid_id: RaidId,
        #[source]
        source: RewardError,
    },

    #[error(transparent)]
    Repository(RepositoryError),

    #[error("{worker} worker join failed")]
    WorkerJoin {
        worker: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RaidNotFound { .. } | Self::NoActiveRaid => ErrorKind::NotFound,
            Self::InactiveRaid { .. } => ErrorKind::InactiveRaid,
            Self::InvalidLoadout(_) | Self::InvalidRaidSpec(_) => ErrorKind::InvalidInput,
            Self::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            Self::RewardDispatch { .. } => ErrorKind::RewardDispatchFailure,
            Self::Repository(_) | Self::WorkerJoin { .. } => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ConcurrencyConflict | ErrorKind::RewardDispatchFailure
        )
    }
}

impl From<RepositoryError> for RuntimeError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::RaidNotFound { raid_id } => Self::RaidNotFound { raid_id },
            other => Self::Repository(other),
        }
    }
}

impl From<LedgerError> for RuntimeError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotActive { raid_id, reason } => Self::InactiveRaid { raid_id, reason },
        }
    }
}
