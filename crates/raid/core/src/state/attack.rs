use super::ids::{RaidId, Timestamp, UserId};

/// One accepted attack. Append-only; created by the ledger, never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttackRecord {
    pub raid_id: RaidId,

    /// Position of this attack in the raid's ledger, starting at 0.
    pub seq: u64,

    pub user_id: UserId,

    /// Damage credited after clamping to the HP that remained.
    pub damage: u32,

    /// Damage rolled before clamping.
    pub requested_damage: u32,

    pub is_critical: bool,

    pub at: Timestamp,

    /// Boss HP immediately after this attack was applied.
    pub hp_after: u64,
}

impl AttackRecord {
    /// True when clamping reduced the credited damage.
    pub fn was_clamped(&self) -> bool {
        self.damage < self.requested_damage
    }

    pub fn is_killing_blow(&self) -> bool {
        self.hp_after == 0 && self.damage > 0
    }
}
