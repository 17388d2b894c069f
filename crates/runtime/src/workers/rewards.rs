//! Reward worker that delivers closed raids' batches to the distributor.
//!
//! Receives [`RewardCommand`]s from the lifecycle manager, retries failed
//! deliveries with backoff, and records the final state in the outbox. A batch
//! that exhausts its attempts stays `Failed` until re-queued.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::RetryPolicy;
use crate::events::{EventBus, RewardEvent};
use crate::rewards::{RewardBatch, RewardDistributor, RewardOutbox};

/// Commands that can be sent to the reward worker
pub enum RewardCommand {
    /// Deliver a batch that the outbox already holds as pending.
    Dispatch(RewardBatch),
    /// Stop after the batch currently being delivered, if any.
    Shutdown,
}

/// Background task that hands reward batches to a [`RewardDistributor`].
pub struct RewardWorker {
    distributor: Arc<dyn RewardDistributor>,
    outbox: Arc<RewardOutbox>,
    policy: RetryPolicy,
    command_rx: mpsc::Receiver<RewardCommand>,
    event_bus: EventBus,
}

impl RewardWorker {
    pub fn new(
        distributor: Arc<dyn RewardDistributor>,
        outbox: Arc<RewardOutbox>,
        policy: RetryPolicy,
        command_rx: mpsc::Receiver<RewardCommand>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            distributor,
            outbox,
            policy,
            command_rx,
            event_bus,
        }
    }

    /// Main worker loop.
    pub async fn run(mut self) {
        info!("RewardWorker started");
        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                RewardCommand::Dispatch(batch) => self.deliver(batch).await,
                RewardCommand::Shutdown => {
                    info!("Shutdown command received");
                    break;
                }
            }
        }
        debug!("RewardWorker stopped");
    }

    async fn deliver(&self, batch: RewardBatch) {
        let raid_id = batch.raid_id;
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.distributor.distribute(&batch).await {
                Ok(()) => {
                    if let Err(err) = self.outbox.mark_delivered(raid_id, attempt) {
                        error!(raid = %raid_id, error = %err, "Could not record delivery");
                    }
                    info!(raid = %raid_id, attempts = attempt, "Rewards delivered");
                    self.event_bus.publish(RewardEvent::RewardDelivered {
                        raid_id,
                        attempts: attempt,
                    });
                    return;
                }
                Err(err) if attempt < max_attempts => {
                    warn!(raid = %raid_id, attempt, error = %err, "Reward dispatch failed, retrying");
                    tokio::time::sleep(self.policy.backoff(attempt)).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(raid = %raid_id, attempts = attempt, error = %err, "Reward dispatch gave up");
                    if let Err(journal) = self.outbox.mark_failed(raid_id, attempt, &err) {
                        error!(raid = %raid_id, error = %journal, "Could not record failure");
                    }
                    self.event_bus.publish(RewardEvent::RewardFailed {
                        raid_id,
                        attempts: attempt,
                        error: err.to_string(),
                    });
                    return;
                }
            }
        }
    }
}
