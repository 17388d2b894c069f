//! Request and response types for [`RaidHandle`](super::RaidHandle).

use raid_core::{BossProfile, ItemId, RaidId, RaidStatus, Standing, UserId};
use serde::{Deserialize, Serialize};

/// Which raid a request targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaidSelector {
    /// The earliest-started raid whose window is open now.
    #[default]
    Active,
    Id(RaidId),
}

impl From<RaidId> for RaidSelector {
    fn from(id: RaidId) -> Self {
        Self::Id(id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRequest {
    pub raid: RaidSelector,
    pub user_id: UserId,
    /// 1 to 5 distinct item ids.
    pub item_ids: Vec<ItemId>,
}

impl AttackRequest {
    pub fn new(
        raid: impl Into<RaidSelector>,
        user_id: impl Into<UserId>,
        item_ids: impl IntoIterator<Item = impl Into<ItemId>>,
    ) -> Self {
        Self {
            raid: raid.into(),
            user_id: user_id.into(),
            item_ids: item_ids.into_iter().map(Into::into).collect(),
        }
    }
}

/// What the attacker sees after an accepted attack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttackReceipt {
    pub raid_id: RaidId,
    /// Damage credited after clamping.
    pub damage: u32,
    /// Damage rolled before clamping.
    pub requested_damage: u32,
    pub is_critical: bool,
    pub boss_hp: u64,
    pub boss_max_hp: u64,
    pub hp_percentage: f64,
    pub xp_earned: u32,
    pub killing_blow: bool,
    /// Attacker's cumulative credited damage in this raid.
    pub user_total: u64,
}

/// Raid display snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RaidStatusView {
    pub raid_id: RaidId,
    pub boss: BossProfile,
    pub status: RaidStatus,
    pub current_hp: u64,
    pub max_hp: u64,
    pub hp_percentage: f64,
    pub participant_count: usize,
    pub time_remaining_ms: u64,
    pub top: Vec<Standing>,
}
