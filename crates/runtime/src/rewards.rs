//! Reward hand-off at raid closure.
//!
//! When a raid turns terminal the lifecycle manager freezes its standings into a
//! [`RewardBatch`] and records it in the [`RewardOutbox`]. The reward worker
//! delivers batches to a [`RewardDistributor`]; failures stay in the outbox
//! until [`RewardOutbox::take_failed`] re-queues them. Nothing in this module
//! can touch raid state.
//!
//! The outbox can be backed by a journal so delivery state survives a restart.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use raid_core::{Raid, RaidId, RaidRewards, RaidStatus, Standing, Timestamp, leaderboard};
use serde::{Deserialize, Serialize};

use crate::repository::{self, AppendLog};

/// Final standings of a closed raid, as handed to the distributor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardBatch {
    pub raid_id: RaidId,
    pub status: RaidStatus,
    /// `true` when the boss was defeated.
    pub victory: bool,
    pub closed_at: Timestamp,
    pub standings: Vec<Standing>,
    pub rewards: RaidRewards,
}

impl RewardBatch {
    /// Snapshot a terminal raid. Returns `None` while the raid is still active.
    pub fn from_raid(raid: &Raid) -> Option<Self> {
        if !raid.status().is_terminal() {
            return None;
        }
        Some(Self {
            raid_id: raid.id(),
            status: raid.status(),
            victory: raid.status() == RaidStatus::Defeated,
            closed_at: raid.closed_at().unwrap_or(raid.ends_at()),
            standings: leaderboard::rank(raid),
            rewards: raid.rewards().clone(),
        })
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RewardError {
    #[error("reward distributor rejected the batch: {0}")]
    Rejected(String),

    #[error("reward distributor unavailable: {0}")]
    Unavailable(String),

    #[error("reward queue is full")]
    QueueFull,

    #[error("reward worker is not running")]
    WorkerUnavailable,

    #[error("interrupted before delivery")]
    Interrupted,
}

/// External collaborator that grants rewards for a closed raid.
///
/// Called at most once per successful delivery; the worker retries on error,
/// so implementations should tolerate seeing the same batch again after a
/// failure they reported.
#[async_trait]
pub trait RewardDistributor: Send + Sync {
    async fn distribute(&self, batch: &RewardBatch) -> Result<(), RewardError>;
}

/// Distributor that only logs the batch.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingDistributor;

#[async_trait]
impl RewardDistributor for LoggingDistributor {
    async fn distribute(&self, batch: &RewardBatch) -> Result<(), RewardError> {
        tracing::info!(
            raid = %batch.raid_id,
            status = %batch.status,
            participants = batch.standings.len(),
            "Distributing rewards"
        );
        for standing in &batch.standings {
            tracing::debug!(
                raid = %batch.raid_id,
                user = %standing.user_id,
                rank = standing.rank,
                damage = standing.damage,
                "Reward standing"
            );
        }
        Ok(())
    }
}

/// Delivery state of one raid's batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchState {
    Pending,
    Delivered { attempts: u32 },
    Failed { attempts: u32, last_error: String },
}

impl DispatchState {
    /// Failed before the distributor ever saw the batch.
    fn is_undispatched(&self) -> bool {
        matches!(self, Self::Failed { attempts: 0, .. })
    }
}

struct OutboxEntry {
    batch: RewardBatch,
    state: DispatchState,
}

/// Journal entry. Replaying them in order rebuilds the outbox.
#[derive(Serialize, Deserialize)]
enum OutboxRecord {
    Enqueued(RewardBatch),
    Settled { raid_id: RaidId, state: DispatchState },
}

#[derive(Default)]
struct OutboxInner {
    entries: HashMap<RaidId, OutboxEntry>,
    journal: Option<AppendLog<OutboxRecord>>,
}

impl OutboxInner {
    /// Journal first, then apply, so memory never runs ahead of disk.
    fn record(&mut self, record: OutboxRecord) -> repository::Result<()> {
        if let Some(journal) = self.journal.as_mut() {
            journal.append(&record)?;
        }
        self.apply(record);
        Ok(())
    }

    fn apply(&mut self, record: OutboxRecord) {
        match record {
            OutboxRecord::Enqueued(batch) => {
                self.entries.entry(batch.raid_id).or_insert(OutboxEntry {
                    batch,
                    state: DispatchState::Pending,
                });
            }
            OutboxRecord::Settled { raid_id, state } => {
                if let Some(entry) = self.entries.get_mut(&raid_id) {
                    entry.state = state;
                }
            }
        }
    }

    fn settle(&mut self, raid_id: RaidId, state: DispatchState) -> repository::Result<()> {
        if !self.entries.contains_key(&raid_id) {
            return Ok(());
        }
        self.record(OutboxRecord::Settled { raid_id, state })
    }

    /// Move the matching batches back to pending and return them, oldest raid
    /// first.
    fn take_where(
        &mut self,
        pick: impl Fn(&DispatchState) -> bool,
    ) -> repository::Result<Vec<RewardBatch>> {
        let mut raid_ids: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, entry)| pick(&entry.state))
            .map(|(raid_id, _)| *raid_id)
            .collect();
        raid_ids.sort();

        let mut batches = Vec::with_capacity(raid_ids.len());
        for raid_id in raid_ids {
            self.settle(raid_id, DispatchState::Pending)?;
            if let Some(entry) = self.entries.get(&raid_id) {
                batches.push(entry.batch.clone());
            }
        }
        Ok(batches)
    }
}

/// Per-raid record of reward batches and their delivery state.
///
/// Every operation completes under one short lock without awaiting, so a
/// caller that is cancelled never leaves an entry half-written.
#[derive(Default)]
pub struct RewardOutbox {
    inner: Mutex<OutboxInner>,
}

impl RewardOutbox {
    /// Outbox kept in memory only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the outbox journaled at `path`, replaying what it holds.
    ///
    /// Batches still pending in the journal were cut off by a shutdown or
    /// crash before the distributor answered; they come back as undispatched
    /// failures so the next reconciliation hands them off again.
    pub fn open(path: impl AsRef<Path>) -> repository::Result<Self> {
        let journal = AppendLog::<OutboxRecord>::open_or_create(path)?;
        let mut inner = OutboxInner::default();
        for record in journal.read_all()? {
            inner.apply(record);
        }
        for entry in inner.entries.values_mut() {
            if entry.state == DispatchState::Pending {
                entry.state = DispatchState::Failed {
                    attempts: 0,
                    last_error: RewardError::Interrupted.to_string(),
                };
            }
        }
        tracing::debug!(entries = inner.entries.len(), "Reward outbox restored");
        inner.journal = Some(journal);

        Ok(Self {
            inner: Mutex::new(inner),
        })
    }

    fn lock(&self) -> MutexGuard<'_, OutboxInner> {
        // Memory only changes after the journal write succeeds, so a poisoned
        // guard still holds a consistent outbox.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a new batch as pending. Returns `false` if the raid already has
    /// one, so a raid can only ever be enqueued once.
    pub fn enqueue(&self, batch: RewardBatch) -> repository::Result<bool> {
        let mut inner = self.lock();
        if inner.entries.contains_key(&batch.raid_id) {
            return Ok(false);
        }
        inner.record(OutboxRecord::Enqueued(batch))?;
        Ok(true)
    }

    pub fn mark_delivered(&self, raid_id: RaidId, attempts: u32) -> repository::Result<()> {
        self.lock()
            .settle(raid_id, DispatchState::Delivered { attempts })
    }

    pub fn mark_failed(
        &self,
        raid_id: RaidId,
        attempts: u32,
        error: &RewardError,
    ) -> repository::Result<()> {
        self.lock().settle(
            raid_id,
            DispatchState::Failed {
                attempts,
                last_error: error.to_string(),
            },
        )
    }

    pub fn state(&self, raid_id: RaidId) -> Option<DispatchState> {
        self.lock()
            .entries
            .get(&raid_id)
            .map(|entry| entry.state.clone())
    }

    pub fn contains(&self, raid_id: RaidId) -> bool {
        self.lock().entries.contains_key(&raid_id)
    }

    /// Move every failed batch back to pending and return them for re-delivery.
    pub fn take_failed(&self) -> repository::Result<Vec<RewardBatch>> {
        self.lock()
            .take_where(|state| matches!(state, DispatchState::Failed { .. }))
    }

    /// Like [`take_failed`](Self::take_failed), but only batches that never
    /// reached the distributor: parked on a full or closed queue, or cut off
    /// by a restart.
    pub fn take_undispatched(&self) -> repository::Result<Vec<RewardBatch>> {
        self.lock().take_where(DispatchState::is_undispatched)
    }
}
