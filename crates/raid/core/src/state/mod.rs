//! Raid records and the types they are built from.
//!
//! A [`Raid`] owns the authoritative HP pool and participant map. Its fields
//! are private: reads go through accessors and every mutation goes through the
//! transitions in [`crate::ledger`], which keep the conservation invariant
//! (`sum(participant damage) == max_hp - current_hp`) intact.

mod attack;
mod ids;
mod participant;

use std::collections::BTreeMap;

pub use attack::AttackRecord;
pub use ids::{RaidId, Timestamp, UserId};
pub use participant::Participant;

/// Raid lifecycle status. `Defeated` and `Expired` are terminal.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::AsRefStr,
    strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RaidStatus {
    Active,
    Defeated,
    Expired,
}

impl RaidStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Defeated | Self::Expired)
    }
}

/// Boss combat stats. Immutable for a raid's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BossStats {
    pub attack: u16,
    pub defense: u16,
    pub speed: u16,
}

/// Presentation data for the boss.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BossProfile {
    pub name: String,
    pub title: String,
    pub description: String,
    /// Free-form category tag shown alongside the boss.
    pub target_category: Option<String>,
}

/// Reward payload forwarded to the reward distributor when the raid closes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RaidRewards {
    pub participation_xp: u32,
    pub victory_xp: u32,
    pub top_damager_title: Option<String>,
}

/// Everything a scheduler provides to open a raid.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RaidSpec {
    pub boss: BossProfile,
    pub stats: BossStats,
    pub max_hp: u64,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub rewards: RaidRewards,
}

/// Rejections for malformed raid specs.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RaidSpecError {
    #[error("boss must have positive max HP")]
    ZeroHp,

    #[error("raid window is empty: starts at {starts_at}, ends at {ends_at}")]
    EmptyWindow {
        starts_at: Timestamp,
        ends_at: Timestamp,
    },
}

/// One time-boxed shared boss encounter.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Raid {
    id: RaidId,
    boss: BossProfile,
    boss_stats: BossStats,
    max_hp: u64,
    pub(crate) current_hp: u64,
    starts_at: Timestamp,
    ends_at: Timestamp,
    pub(crate) status: RaidStatus,
    pub(crate) participants: BTreeMap<UserId, Participant>,
    pub(crate) attack_count: u64,
    rewards: RaidRewards,
    created_at: Timestamp,
    pub(crate) closed_at: Option<Timestamp>,
}

impl Raid {
    /// Opens a new raid in `Active` status at full HP.
    pub fn new(id: RaidId, spec: RaidSpec, created_at: Timestamp) -> Result<Self, RaidSpecError> {
        if spec.max_hp == 0 {
            return Err(RaidSpecError::ZeroHp);
        }
        if spec.ends_at <= spec.starts_at {
            return Err(RaidSpecError::EmptyWindow {
                starts_at: spec.starts_at,
                ends_at: spec.ends_at,
            });
        }

        Ok(Self {
            id,
            boss: spec.boss,
            boss_stats: spec.stats,
            max_hp: spec.max_hp,
            current_hp: spec.max_hp,
            starts_at: spec.starts_at,
            ends_at: spec.ends_at,
            status: RaidStatus::Active,
            participants: BTreeMap::new(),
            attack_count: 0,
            rewards: spec.rewards,
            created_at,
            closed_at: None,
        })
    }

    pub fn id(&self) -> RaidId {
        self.id
    }

    pub fn boss(&self) -> &BossProfile {
        &self.boss
    }

    pub fn boss_stats(&self) -> &BossStats {
        &self.boss_stats
    }

    pub fn max_hp(&self) -> u64 {
        self.max_hp
    }

    pub fn current_hp(&self) -> u64 {
        self.current_hp
    }

    pub fn starts_at(&self) -> Timestamp {
        self.starts_at
    }

    pub fn ends_at(&self) -> Timestamp {
        self.ends_at
    }

    pub fn status(&self) -> RaidStatus {
        self.status
    }

    pub fn rewards(&self) -> &RaidRewards {
        &self.rewards
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn closed_at(&self) -> Option<Timestamp> {
        self.closed_at
    }

    /// Number of accepted attacks; also the sequence number of the next one.
    pub fn attack_count(&self) -> u64 {
        self.attack_count
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn participant(&self, user_id: &UserId) -> Option<&Participant> {
        self.participants.get(user_id)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// HP lost so far.
    pub fn damage_taken(&self) -> u64 {
        self.max_hp - self.current_hp
    }

    /// Sum of all credited participant damage.
    pub fn credited_damage(&self) -> u64 {
        self.participants.values().map(|p| p.damage).sum()
    }

    /// Whether credited damage matches HP lost.
    pub fn is_conserved(&self) -> bool {
        self.current_hp <= self.max_hp && self.credited_damage() == self.damage_taken()
    }

    /// Remaining HP as a percentage of max HP, in `[0, 100]`.
    pub fn hp_percentage(&self) -> f64 {
        (self.current_hp as f64 / self.max_hp as f64 * 100.0).max(0.0)
    }

    /// Milliseconds left in the attack window; zero once closed or past `ends_at`.
    pub fn time_remaining(&self, now: Timestamp) -> u64 {
        if self.status.is_terminal() {
            return 0;
        }
        now.millis_until(self.ends_at)
    }

    /// Active raid whose window has not opened yet.
    pub fn is_upcoming(&self, now: Timestamp) -> bool {
        self.status == RaidStatus::Active && now < self.starts_at
    }

    /// Active raid whose window contains `now`.
    pub fn is_open_at(&self, now: Timestamp) -> bool {
        self.status == RaidStatus::Active && self.starts_at <= now && now < self.ends_at
    }

    /// Active raid whose window has passed; eligible for the expiry claim.
    pub fn is_expiry_due(&self, now: Timestamp) -> bool {
        self.status == RaidStatus::Active && now >= self.ends_at && self.current_hp > 0
    }
}
