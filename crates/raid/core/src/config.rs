/// Tunable damage curve parameters.
///
/// Percentages are expressed in basis points (1/10000) so every computation
/// stays in integer arithmetic and floors exactly once.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CombatParams {
    /// Damage mitigation granted per point of boss defense.
    pub defense_mitigation_bp: u32,

    /// Upper bound on total defense mitigation.
    pub max_mitigation_bp: u32,

    /// Attacker speed the boss speed is compared against.
    pub attacker_speed_baseline: u16,

    /// Damage scaling per point of speed difference (baseline - boss speed).
    pub speed_bp_per_point: u32,

    /// Lower clamp of the speed factor.
    pub min_speed_factor_bp: u32,

    /// Upper clamp of the speed factor.
    pub max_speed_factor_bp: u32,

    /// Bonus per item beyond the first.
    pub synergy_bp_per_extra_item: u32,

    /// Critical hit probability in percent (0-100).
    pub crit_chance_pct: u32,

    /// Critical damage multiplier in percent. Must be greater than 100.
    pub crit_multiplier_pct: u32,
}

impl CombatParams {
    /// One whole in basis points.
    pub const BP_SCALE: u32 = 10_000;

    /// Base power of an item that carries no stats.
    pub const DEFAULT_ITEM_POWER: u32 = 10;

    /// Mitigation for the given boss defense, capped at `max_mitigation_bp`.
    pub fn mitigation_bp(&self, defense: u16) -> u32 {
        (defense as u32)
            .saturating_mul(self.defense_mitigation_bp)
            .min(self.max_mitigation_bp)
            .min(Self::BP_SCALE)
    }

    /// Speed factor for the given boss speed.
    ///
    /// Bosses slower than the attacker baseline take more damage, faster ones
    /// take less.
    pub fn speed_factor_bp(&self, boss_speed: u16) -> u32 {
        let diff = self.attacker_speed_baseline as i64 - boss_speed as i64;
        let factor = Self::BP_SCALE as i64 + diff * self.speed_bp_per_point as i64;
        factor.clamp(
            self.min_speed_factor_bp as i64,
            self.max_speed_factor_bp as i64,
        ) as u32
    }

    /// Synergy multiplier for a loadout of `items` items.
    pub fn synergy_bp(&self, items: usize) -> u32 {
        let extra = items.saturating_sub(1) as u32;
        Self::BP_SCALE.saturating_add(extra.saturating_mul(self.synergy_bp_per_extra_item))
    }
}

impl Default for CombatParams {
    fn default() -> Self {
        Self {
            defense_mitigation_bp: 100,
            max_mitigation_bp: 7_500,
            attacker_speed_baseline: 20,
            speed_bp_per_point: 50,
            min_speed_factor_bp: 5_000,
            max_speed_factor_bp: 15_000,
            synergy_bp_per_extra_item: 0,
            crit_chance_pct: 10,
            crit_multiplier_pct: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mitigation_is_capped() {
        let params = CombatParams::default();
        assert_eq!(params.mitigation_bp(0), 0);
        assert_eq!(params.mitigation_bp(20), 2_000);
        assert_eq!(params.mitigation_bp(u16::MAX), 7_500);
    }

    #[test]
    fn speed_factor_is_neutral_at_baseline() {
        let params = CombatParams::default();
        assert_eq!(params.speed_factor_bp(20), 10_000);
        assert_eq!(params.speed_factor_bp(40), 9_000);
        assert_eq!(params.speed_factor_bp(0), 11_000);
        assert_eq!(params.speed_factor_bp(u16::MAX), 5_000);
    }

    #[test]
    fn synergy_scales_with_extra_items() {
        let params = CombatParams {
            synergy_bp_per_extra_item: 1_000,
            ..CombatParams::default()
        };
        assert_eq!(params.synergy_bp(1), 10_000);
        assert_eq!(params.synergy_bp(3), 12_000);
    }
}
