//! Experience awarded per attack.

use raid_core::AttackRecord;

/// Maps an accepted attack to the XP shown on the receipt.
pub trait XpPolicy: Send + Sync {
    fn xp_for(&self, record: &AttackRecord) -> u32;
}

/// One XP per `damage_per_xp` credited damage, plus a flat critical bonus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinearXp {
    pub damage_per_xp: u32,
    pub critical_bonus: u32,
}

impl Default for LinearXp {
    fn default() -> Self {
        Self {
            damage_per_xp: 10,
            critical_bonus: 25,
        }
    }
}

impl XpPolicy for LinearXp {
    fn xp_for(&self, record: &AttackRecord) -> u32 {
        let base = record.damage / self.damage_per_xp.max(1);
        if record.is_critical {
            base.saturating_add(self.critical_bonus)
        } else {
            base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raid_core::{RaidId, Timestamp, UserId};

    fn record(damage: u32, is_critical: bool) -> AttackRecord {
        AttackRecord {
            raid_id: RaidId(1),
            seq: 0,
            user_id: UserId::from("a"),
            damage,
            requested_damage: damage,
            is_critical,
            at: Timestamp(0),
            hp_after: 100,
        }
    }

    #[test]
    fn linear_xp_uses_credited_damage() {
        let xp = LinearXp::default();
        assert_eq!(xp.xp_for(&record(36, false)), 3);
        assert_eq!(xp.xp_for(&record(72, true)), 32);
        assert_eq!(xp.xp_for(&record(0, false)), 0);
    }
}
