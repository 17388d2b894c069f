//! Raid closure and the reward hand-off.
//!
//! Closure has two entry points. A defeat is claimed by the ledger commit that
//! drives HP to zero; an expiry is claimed here through a guarded commit. In
//! both cases only the claim winner calls [`LifecycleManager::close`], and the
//! outbox refuses a second batch for the same raid.
//!
//! [`LifecycleManager::close`] never awaits, so once a claim commits the batch
//! is recorded and either queued for the reward worker or parked as failed.
//! [`LifecycleManager::reconcile`] covers what a claim winner never got to:
//! terminal raids with no outbox entry (a crash right after the commit) and
//! parked batches.

use std::sync::Arc;

use raid_core::{Raid, RaidId, Timestamp};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use crate::api::{Result, RuntimeError};
use crate::events::{EventBus, LifecycleEvent, RewardEvent};
use crate::ledger::RaidLedger;
use crate::repository::RaidRepository;
use crate::rewards::{DispatchState, RewardBatch, RewardError, RewardOutbox};
use crate::workers::RewardCommand;

#[derive(Clone)]
pub struct LifecycleManager {
    ledger: RaidLedger,
    repo: Arc<dyn RaidRepository>,
    outbox: Arc<RewardOutbox>,
    reward_tx: mpsc::Sender<RewardCommand>,
    event_bus: EventBus,
}

impl LifecycleManager {
    pub(crate) fn new(
        ledger: RaidLedger,
        repo: Arc<dyn RaidRepository>,
        outbox: Arc<RewardOutbox>,
        reward_tx: mpsc::Sender<RewardCommand>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            ledger,
            repo,
            outbox,
            reward_tx,
            event_bus,
        }
    }

    /// Freeze standings and queue the reward batch for a raid that just turned
    /// terminal.
    ///
    /// Reward failures are recorded in the outbox and never reopen the raid.
    pub fn close(&self, raid: &Raid) {
        let Some(batch) = RewardBatch::from_raid(raid) else {
            warn!(raid = %raid.id(), "Refusing to close an active raid");
            return;
        };
        let raid_id = batch.raid_id;
        match self.outbox.enqueue(batch.clone()) {
            Ok(true) => {}
            Ok(false) => {
                debug!(raid = %raid_id, "Reward batch already queued");
                return;
            }
            Err(err) => {
                // No entry was written; reconciliation picks the raid up again.
                error!(raid = %raid_id, error = %err, "Could not record reward batch");
                return;
            }
        }

        info!(
            raid = %raid_id,
            status = %batch.status,
            participants = batch.standings.len(),
            hp = raid.current_hp(),
            "Raid closed"
        );
        self.event_bus.publish(LifecycleEvent::RaidClosed {
            raid_id,
            status: batch.status,
            closed_at: batch.closed_at,
            participants: batch.standings.len(),
        });

        self.dispatch(batch);
    }

    /// Hand a pending batch to the reward worker without waiting for room.
    ///
    /// A full or closed queue parks the batch as failed with zero attempts and
    /// returns the reason.
    fn dispatch(&self, batch: RewardBatch) -> std::result::Result<(), RewardError> {
        let raid_id = batch.raid_id;
        let err = match self.reward_tx.try_send(RewardCommand::Dispatch(batch)) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(_)) => RewardError::QueueFull,
            Err(TrySendError::Closed(_)) => RewardError::WorkerUnavailable,
        };

        warn!(raid = %raid_id, error = %err, "Reward batch parked");
        if let Err(journal) = self.outbox.mark_failed(raid_id, 0, &err) {
            error!(raid = %raid_id, error = %journal, "Could not record parked batch");
        }
        self.event_bus.publish(RewardEvent::RewardFailed {
            raid_id,
            attempts: 0,
            error: err.to_string(),
        });
        Err(err)
    }

    /// Expire `raid_id` if its window has passed with HP remaining.
    ///
    /// Returns `true` only for the caller that performed the transition.
    pub async fn expire_if_due(&self, raid_id: RaidId, now: Timestamp) -> Result<bool> {
        match self.ledger.claim_expiry(raid_id, now).await? {
            Some(raid) => {
                self.close(&raid);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Expire every raid that is due at `now`, then reconcile the outbox.
    /// Returns the ids this call expired.
    pub async fn sweep_expired(&self, now: Timestamp) -> Result<Vec<RaidId>> {
        let mut expired = Vec::new();
        for current in self.repo.find_active(now)? {
            if !current.raid.is_expiry_due(now) {
                continue;
            }
            let raid_id = current.raid.id();
            if self.expire_if_due(raid_id, now).await? {
                expired.push(raid_id);
            }
        }
        self.reconcile()?;
        Ok(expired)
    }

    /// Make sure every terminal raid has its reward batch handed off.
    ///
    /// Closes terminal raids the outbox has never seen and re-queues batches
    /// that were parked before reaching the reward worker. Batches the
    /// distributor already failed stay put for [`retry_failed`](Self::retry_failed).
    /// Returns the raids handed to the worker by this call.
    pub fn reconcile(&self) -> Result<Vec<RaidId>> {
        let mut recovered = Vec::new();
        for stored in self.repo.list()? {
            let raid = stored.raid;
            if !raid.status().is_terminal() || self.outbox.contains(raid.id()) {
                continue;
            }
            warn!(
                raid = %raid.id(),
                status = %raid.status(),
                "Closing raid with no reward batch"
            );
            self.close(&raid);
            if self.outbox.state(raid.id()) == Some(DispatchState::Pending) {
                recovered.push(raid.id());
            }
        }

        let mut parked = self.outbox.take_undispatched()?.into_iter();
        while let Some(batch) = parked.next() {
            let raid_id = batch.raid_id;
            if let Err(source) = self.dispatch(batch) {
                for rest in parked {
                    self.outbox.mark_failed(rest.raid_id, 0, &source)?;
                }
                break;
            }
            recovered.push(raid_id);
        }

        if !recovered.is_empty() {
            info!(count = recovered.len(), "Reward hand-offs recovered");
        }
        Ok(recovered)
    }

    /// Re-queue every batch whose delivery failed. Returns how many were sent.
    pub fn retry_failed(&self) -> Result<usize> {
        let mut batches = self.outbox.take_failed()?.into_iter();
        let mut sent = 0;
        while let Some(batch) = batches.next() {
            let raid_id = batch.raid_id;
            if let Err(source) = self.dispatch(batch) {
                for rest in batches {
                    self.outbox.mark_failed(rest.raid_id, 0, &source)?;
                }
                return Err(RuntimeError::RewardDispatch { raid_id, source });
            }
            info!(raid = %raid_id, "Reward batch re-queued");
            sent += 1;
        }
        Ok(sent)
    }

    pub fn reward_status(&self, raid_id: RaidId) -> Option<DispatchState> {
        self.outbox.state(raid_id)
    }
}
