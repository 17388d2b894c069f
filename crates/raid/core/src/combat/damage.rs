//! Damage calculation.

use super::loadout::Loadout;
use crate::config::CombatParams;
use crate::rng::RandomSource;
use crate::state::BossStats;

/// Result of resolving one attack against a boss.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DamageRoll {
    pub damage: u32,
    pub is_critical: bool,
}

/// Calculate damage for a loadout when the critical outcome is already known.
///
/// # Formula
///
/// ```text
/// base       = sum(item base powers)
/// mitigation = min(defense * defense_mitigation_bp, max_mitigation_bp)
/// speed      = clamp(10000 + (baseline - boss_speed) * speed_bp_per_point)
/// synergy    = 10000 + (items - 1) * synergy_bp_per_extra_item
/// damage     = floor(base * (10000 - mitigation) * speed * synergy / 10000^3)
///
/// if critical:
///     damage = damage * crit_multiplier_pct / 100
/// ```
///
/// Higher defense never increases damage: mitigation is monotonic in defense
/// and every factor is non-negative.
pub fn calculate_damage(
    loadout: &Loadout,
    boss: &BossStats,
    params: &CombatParams,
    is_critical: bool,
) -> u32 {
    let scale = CombatParams::BP_SCALE as u128;

    let base = loadout.total_power() as u128;
    let defense_factor = scale - params.mitigation_bp(boss.defense) as u128;
    let speed_factor = params.speed_factor_bp(boss.speed) as u128;
    let synergy = params.synergy_bp(loadout.len()) as u128;

    let mut damage = base * defense_factor * speed_factor * synergy / (scale * scale * scale);

    if is_critical {
        damage = damage * params.crit_multiplier_pct as u128 / 100;
    }

    damage.min(u32::MAX as u128) as u32
}

/// Resolve an attack: roll for a critical hit, then calculate damage.
///
/// Exactly one d100 is drawn per call, so a scripted source maps one value to
/// one attack.
pub fn compute_damage(
    loadout: &Loadout,
    boss: &BossStats,
    params: &CombatParams,
    rng: &mut impl RandomSource,
) -> DamageRoll {
    let is_critical = rng.roll_d100() <= params.crit_chance_pct;
    DamageRoll {
        damage: calculate_damage(loadout, boss, params, is_critical),
        is_critical,
    }
}
