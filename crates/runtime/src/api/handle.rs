//! Cloneable façade over the raid runtime.
//!
//! [`RaidHandle`] is what request handlers hold. It validates input, rolls
//! damage, drives the ledger and lifecycle manager, and exposes read views.
//! Every read that names a raid runs the expiry check first, so a raid past
//! `ends_at` is never reported as active.
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use raid_core::{
    AttackRecord, CombatParams, InactiveReason, ItemCatalog, Loadout, PcgRng, Raid, RaidId,
    RaidSpec, Standing, Timestamp, UserId, UserRaidStats, compute_damage, compute_seed,
    leaderboard,
};

use super::errors::{Result, RuntimeError};
use super::types::{AttackReceipt, AttackRequest, RaidSelector, RaidStatusView};
use crate::clock::Clock;
use crate::events::{AttackEvent, Event, EventBus, LifecycleEvent, Topic};
use crate::ledger::{CommittedAttack, RaidLedger};
use crate::lifecycle::LifecycleManager;
use crate::repository::RaidRepository;
use crate::rewards::DispatchState;
use crate::xp::XpPolicy;

/// Client-facing handle to interact with the runtime
#[derive(Clone)]
pub struct RaidHandle {
    pub(crate) repo: Arc<dyn RaidRepository>,
    pub(crate) catalog: Arc<dyn ItemCatalog>,
    pub(crate) ledger: RaidLedger,
    pub(crate) lifecycle: LifecycleManager,
    pub(crate) event_bus: EventBus,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) xp: Arc<dyn XpPolicy>,
    pub(crate) combat: Arc<CombatParams>,
    pub(crate) leaderboard_size: usize,
    pub(crate) seed: u64,
    pub(crate) nonce: Arc<AtomicU64>,
}

impl RaidHandle {
    /// Attack a raid with a set of items.
    ///
    /// The item list is validated before anything else; an invalid list never
    /// reaches the ledger. An attack landing after `ends_at` expires the raid
    /// and is rejected.
    pub async fn attack(&self, request: AttackRequest) -> Result<AttackReceipt> {
        let loadout = Loadout::resolve(&request.item_ids, self.catalog.as_ref())?;
        let now = self.clock.now();
        let raid_id = self.resolve(request.raid, now).await?;
        let raid = self.load(raid_id)?;

        let mut rng = PcgRng::from_seed(compute_seed(
            self.seed,
            self.nonce.fetch_add(1, Ordering::Relaxed),
            raid_id.0,
        ));
        let roll = compute_damage(&loadout, raid.boss_stats(), &self.combat, &mut rng);

        let committed = self
            .ledger
            .apply_attack(raid_id, &request.user_id, roll, loadout.item_ids(), now)
            .await;
        let CommittedAttack { outcome, raid } = match committed {
            Ok(committed) => committed,
            Err(RuntimeError::InactiveRaid {
                raid_id,
                reason: InactiveReason::WindowClosed,
            }) => {
                self.lifecycle.expire_if_due(raid_id, now).await?;
                return Err(RuntimeError::InactiveRaid {
                    raid_id,
                    reason: InactiveReason::Expired,
                });
            }
            Err(err) => return Err(err),
        };

        self.event_bus.publish(AttackEvent::AttackApplied {
            record: outcome.record.clone(),
            user_total: outcome.user_total,
            killing_blow: outcome.killing_blow,
        });
        // No await between the winning commit and the hand-off.
        if outcome.killing_blow {
            self.lifecycle.close(&raid);
        }

        Ok(AttackReceipt {
            raid_id,
            damage: outcome.record.damage,
            requested_damage: outcome.record.requested_damage,
            is_critical: outcome.record.is_critical,
            boss_hp: raid.current_hp(),
            boss_max_hp: raid.max_hp(),
            hp_percentage: raid.hp_percentage(),
            xp_earned: self.xp.xp_for(&outcome.record),
            killing_blow: outcome.killing_blow,
            user_total: outcome.user_total,
        })
    }

    /// Display snapshot of a raid, with the top of the leaderboard.
    pub async fn status(&self, selector: impl Into<RaidSelector>) -> Result<RaidStatusView> {
        let now = self.clock.now();
        let raid_id = self.resolve(selector.into(), now).await?;
        let raid = self.load_fresh(raid_id, now).await?;

        Ok(RaidStatusView {
            raid_id,
            boss: raid.boss().clone(),
            status: raid.status(),
            current_hp: raid.current_hp(),
            max_hp: raid.max_hp(),
            hp_percentage: raid.hp_percentage(),
            participant_count: raid.participant_count(),
            time_remaining_ms: raid.time_remaining(now),
            top: leaderboard::top(&raid, self.leaderboard_size),
        })
    }

    /// Full raid record.
    pub async fn raid(&self, raid_id: RaidId) -> Result<Raid> {
        self.load_fresh(raid_id, self.clock.now()).await
    }

    /// Top `n` standings of a raid.
    pub async fn leaderboard(&self, raid_id: RaidId, n: usize) -> Result<Vec<Standing>> {
        let raid = self.load_fresh(raid_id, self.clock.now()).await?;
        Ok(leaderboard::top(&raid, n))
    }

    /// One user's standing in a raid, if they attacked it.
    pub async fn standing(&self, raid_id: RaidId, user_id: &UserId) -> Result<Option<Standing>> {
        let raid = self.load_fresh(raid_id, self.clock.now()).await?;
        Ok(leaderboard::standing(&raid, user_id))
    }

    /// Lifetime statistics for a user across all stored raids.
    pub fn user_stats(&self, user_id: &UserId) -> Result<UserRaidStats> {
        let raids = self.repo.list()?;
        Ok(UserRaidStats::collect(
            user_id,
            raids.iter().map(|stored| &stored.raid),
        ))
    }

    /// Accepted attacks against a raid, in ledger order.
    pub fn attack_log(&self, raid_id: RaidId) -> Result<Vec<AttackRecord>> {
        Ok(self.repo.attacks(raid_id)?)
    }

    /// Active raids whose window has not opened yet, soonest first.
    pub fn upcoming_raids(&self) -> Result<Vec<Raid>> {
        let now = self.clock.now();
        let mut raids: Vec<_> = self
            .repo
            .list()?
            .into_iter()
            .map(|stored| stored.raid)
            .filter(|raid| raid.is_upcoming(now))
            .collect();
        raids.sort_by_key(|raid| (raid.starts_at(), raid.id()));
        Ok(raids)
    }

    /// Closed raids, most recently closed first.
    pub fn raid_history(&self, limit: usize) -> Result<Vec<Raid>> {
        let mut raids: Vec<_> = self
            .repo
            .list()?
            .into_iter()
            .map(|stored| stored.raid)
            .filter(|raid| raid.status().is_terminal())
            .collect();
        raids.sort_by_key(|raid| std::cmp::Reverse((raid.closed_at(), raid.id())));
        raids.truncate(limit);
        Ok(raids)
    }

    /// Open a new raid.
    pub fn create_raid(&self, spec: RaidSpec) -> Result<RaidId> {
        let raid_id = self.repo.next_id()?;
        let raid = Raid::new(raid_id, spec, self.clock.now())?;
        self.repo.insert(&raid)?;

        tracing::info!(
            raid = %raid_id,
            boss = %raid.boss().name,
            max_hp = raid.max_hp(),
            starts_at = %raid.starts_at(),
            ends_at = %raid.ends_at(),
            "Raid created"
        );
        self.event_bus.publish(LifecycleEvent::RaidCreated {
            raid_id,
            starts_at: raid.starts_at(),
            ends_at: raid.ends_at(),
        });
        Ok(raid_id)
    }

    /// Expire every raid whose window has passed and re-queue reward batches
    /// that never reached the reward worker. Returns the ids expired by this
    /// call.
    pub async fn sweep_expired(&self) -> Result<Vec<RaidId>> {
        self.lifecycle.sweep_expired(self.clock.now()).await
    }

    /// Re-queue reward batches whose delivery failed.
    pub fn retry_failed_rewards(&self) -> Result<usize> {
        self.lifecycle.retry_failed()
    }

    /// Reward delivery state for a closed raid.
    pub fn reward_status(&self, raid_id: RaidId) -> Option<DispatchState> {
        self.lifecycle.reward_status(raid_id)
    }

    /// Subscribe to events from a specific topic
    ///
    /// # Topics
    ///
    /// - `Topic::Attack` - Accepted attacks
    /// - `Topic::Lifecycle` - Raid creation and closure
    /// - `Topic::Reward` - Reward delivery outcomes
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.event_bus.subscribe(topic)
    }

    /// Get a reference to the event bus for advanced usage
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    async fn resolve(&self, selector: RaidSelector, now: Timestamp) -> Result<RaidId> {
        match selector {
            RaidSelector::Id(raid_id) => Ok(raid_id),
            RaidSelector::Active => self.find_active(now).await,
        }
    }

    /// Earliest-started open raid. Overdue raids met on the way are expired.
    async fn find_active(&self, now: Timestamp) -> Result<RaidId> {
        for stored in self.repo.find_active(now)? {
            let raid = stored.raid;
            if raid.is_expiry_due(now) {
                self.lifecycle.expire_if_due(raid.id(), now).await?;
                continue;
            }
            if raid.is_open_at(now) {
                return Ok(raid.id());
            }
        }
        Err(RuntimeError::NoActiveRaid)
    }

    fn load(&self, raid_id: RaidId) -> Result<Raid> {
        self.repo
            .load(raid_id)?
            .map(|stored| stored.raid)
            .ok_or(RuntimeError::RaidNotFound { raid_id })
    }

    async fn load_fresh(&self, raid_id: RaidId, now: Timestamp) -> Result<Raid> {
        self.lifecycle.expire_if_due(raid_id, now).await?;
        self.load(raid_id)
    }
}
