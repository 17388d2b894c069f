//! Periodic expiry sweep.
//!
//! Reads already expire raids lazily; this worker covers raids nobody looks at
//! so their rewards still go out shortly after `ends_at`. Each sweep also
//! reconciles the reward outbox, re-queueing batches parked on a full queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::lifecycle::LifecycleManager;

pub struct ExpiryWorker {
    lifecycle: LifecycleManager,
    clock: Arc<dyn Clock>,
    interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl ExpiryWorker {
    pub fn new(
        lifecycle: LifecycleManager,
        clock: Arc<dyn Clock>,
        interval: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            lifecycle,
            clock,
            interval,
            shutdown_rx,
        }
    }

    /// Main worker loop.
    pub async fn run(mut self) {
        info!(interval = ?self.interval, "ExpiryWorker started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.sweep().await,
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("ExpiryWorker stopped");
    }

    async fn sweep(&self) {
        let now = self.clock.now();
        match self.lifecycle.sweep_expired(now).await {
            Ok(expired) if !expired.is_empty() => {
                info!(count = expired.len(), "Expired raids");
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "Expiry sweep failed"),
        }
    }
}
