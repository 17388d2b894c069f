//! Optimistic commit loop over the raid repository.
//!
//! Every mutation runs the pure transition from `raid-core` on a private copy of
//! the raid, then publishes the copy with a versioned compare-and-swap. A lost
//! race reloads and reruns the transition against the fresh state, so two
//! writers can never both apply against the same HP.

use std::sync::Arc;

use raid_core::{AttackOutcome, DamageRoll, ItemId, Raid, RaidId, Timestamp, UserId};
use tracing::{debug, warn};

use crate::api::{Result, RuntimeError};
use crate::config::RetryPolicy;
use crate::repository::{RaidRepository, RepositoryError};

/// Outcome of a committed attack, with the raid as stored by that commit.
#[derive(Clone, Debug)]
pub struct CommittedAttack {
    pub outcome: AttackOutcome,
    pub raid: Raid,
}

#[derive(Clone)]
pub struct RaidLedger {
    repo: Arc<dyn RaidRepository>,
    policy: RetryPolicy,
}

impl RaidLedger {
    pub fn new(repo: Arc<dyn RaidRepository>, policy: RetryPolicy) -> Self {
        Self { repo, policy }
    }

    /// Credit `roll` to `user_id` against `raid_id`.
    ///
    /// The damage roll is fixed before the first attempt; retries only
    /// re-clamp it against fresh HP. If this commit drives HP to zero, the
    /// returned outcome carries `killing_blow` and the stored raid is already
    /// `Defeated`.
    pub async fn apply_attack(
        &self,
        raid_id: RaidId,
        user_id: &UserId,
        roll: DamageRoll,
        items: &[ItemId],
        now: Timestamp,
    ) -> Result<CommittedAttack> {
        let mut attempt = 1;
        loop {
            let current = self
                .repo
                .load(raid_id)?
                .ok_or(RuntimeError::RaidNotFound { raid_id })?;

            let mut next = current.raid;
            let outcome = next.apply_attack(user_id, roll, items, now)?;

            match self
                .repo
                .commit(current.version, &next, Some(&outcome.record))
            {
                Ok(version) => {
                    debug!(
                        raid = %raid_id,
                        user = %user_id,
                        seq = outcome.record.seq,
                        damage = outcome.record.damage,
                        hp = outcome.record.hp_after,
                        version,
                        "Attack committed"
                    );
                    return Ok(CommittedAttack {
                        outcome,
                        raid: next,
                    });
                }
                Err(err) => self.after_conflict(raid_id, err, &mut attempt).await?,
            }
        }
    }

    /// Claim the `active -> expired` transition if it is due at `now`.
    ///
    /// Returns the expired raid only to the caller whose commit performed the
    /// transition; everyone else gets `None`.
    pub async fn claim_expiry(&self, raid_id: RaidId, now: Timestamp) -> Result<Option<Raid>> {
        let mut attempt = 1;
        loop {
            let current = self
                .repo
                .load(raid_id)?
                .ok_or(RuntimeError::RaidNotFound { raid_id })?;

            let mut next = current.raid;
            if !next.claim_expiry(now) {
                return Ok(None);
            }

            match self.repo.commit(current.version, &next, None) {
                Ok(_) => return Ok(Some(next)),
                Err(err) => self.after_conflict(raid_id, err, &mut attempt).await?,
            }
        }
    }

    /// Back off after a failed commit, or give up.
    async fn after_conflict(
        &self,
        raid_id: RaidId,
        err: RepositoryError,
        attempt: &mut u32,
    ) -> Result<()> {
        if !err.is_conflict() {
            return Err(err.into());
        }
        if *attempt >= self.policy.max_attempts {
            warn!(raid = %raid_id, attempts = *attempt, "Commit retries exhausted");
            return Err(RuntimeError::ConcurrencyConflict {
                raid_id,
                attempts: *attempt,
            });
        }

        let delay = self.policy.backoff(*attempt);
        debug!(raid = %raid_id, attempt = *attempt, ?delay, "Version conflict, retrying");
        tokio::time::sleep(delay).await;
        *attempt += 1;
        Ok(())
    }
}
