//! Standings derived from raid state.
//!
//! Nothing here is cached: every call recomputes from the participant map, so
//! two calls over the same raid always agree.

use std::cmp::Ordering;

use crate::state::{Participant, Raid, RaidStatus, UserId};

/// One participant's position in a raid.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Standing {
    pub user_id: UserId,
    pub damage: u64,
    /// 1-based, unique within a raid.
    pub rank: u32,
    pub attack_count: u32,
    pub best_attack: u32,
}

/// Descending damage; ties go to the earlier first attack.
fn by_contribution(a: &Participant, b: &Participant) -> Ordering {
    b.damage
        .cmp(&a.damage)
        .then(a.joined_at.cmp(&b.joined_at))
        .then(a.first_attack_seq.cmp(&b.first_attack_seq))
}

fn ordered(raid: &Raid) -> Vec<&Participant> {
    let mut participants: Vec<_> = raid.participants().collect();
    participants.sort_by(|a, b| by_contribution(a, b));
    participants
}

fn to_standing(index: usize, participant: &Participant) -> Standing {
    Standing {
        user_id: participant.user_id.clone(),
        damage: participant.damage,
        rank: index as u32 + 1,
        attack_count: participant.attack_count,
        best_attack: participant.best_attack,
    }
}

/// Full standings for `raid`.
pub fn rank(raid: &Raid) -> Vec<Standing> {
    ordered(raid)
        .into_iter()
        .enumerate()
        .map(|(i, p)| to_standing(i, p))
        .collect()
}

/// First `n` standings.
pub fn top(raid: &Raid, n: usize) -> Vec<Standing> {
    ordered(raid)
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(i, p)| to_standing(i, p))
        .collect()
}

/// Standing of one user, or `None` if they have not attacked this raid.
pub fn standing(raid: &Raid, user_id: &UserId) -> Option<Standing> {
    ordered(raid)
        .into_iter()
        .enumerate()
        .find(|(_, p)| &p.user_id == user_id)
        .map(|(i, p)| to_standing(i, p))
}

/// Lifetime statistics for one user across a set of raids.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserRaidStats {
    pub user_id: UserId,
    pub raids_participated: u32,
    /// Participated raids that ended `Defeated`.
    pub victories: u32,
    pub total_damage: u64,
    pub total_attacks: u64,
    /// `total_damage / raids_participated`, rounded down.
    pub average_damage_per_raid: u64,
    pub best_attack: u32,
}

impl UserRaidStats {
    /// Aggregates `user_id`'s contribution over `raids`. Raids the user never
    /// attacked are skipped.
    pub fn collect<'a>(user_id: &UserId, raids: impl IntoIterator<Item = &'a Raid>) -> Self {
        let mut stats = Self {
            user_id: user_id.clone(),
            ..Self::default()
        };

        for raid in raids {
            let Some(participant) = raid.participant(user_id) else {
                continue;
            };
            stats.raids_participated += 1;
            if raid.status() == RaidStatus::Defeated {
                stats.victories += 1;
            }
            stats.total_damage += participant.damage;
            stats.total_attacks += participant.attack_count as u64;
            stats.best_attack = stats.best_attack.max(participant.best_attack);
        }

        if stats.raids_participated > 0 {
            stats.average_damage_per_raid = stats.total_damage / stats.raids_participated as u64;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::DamageRoll;
    use crate::state::fixtures::raid;
    use crate::state::{RaidId, Timestamp};

    fn hit(raid: &mut Raid, user: &str, damage: u32, at: u64) {
        raid.apply_attack(
            &UserId::from(user),
            DamageRoll {
                damage,
                is_critical: false,
            },
            &[],
            Timestamp(at),
        )
        .unwrap();
    }

    #[test]
    fn ranks_by_damage_descending() {
        let mut raid = raid(1_000);
        hit(&mut raid, "carol", 10, 2_000);
        hit(&mut raid, "alice", 50, 2_001);
        hit(&mut raid, "bob", 30, 2_002);

        let names: Vec<_> = rank(&raid).into_iter().map(|s| (s.user_id.0, s.rank)).collect();
        assert_eq!(
            names,
            vec![("alice".into(), 1), ("bob".into(), 2), ("carol".into(), 3)]
        );
    }

    #[test]
    fn ties_go_to_the_earlier_first_attack() {
        let mut raid = raid(1_000);
        hit(&mut raid, "late", 20, 3_000);
        hit(&mut raid, "early", 5, 2_000);
        hit(&mut raid, "early", 15, 4_000);

        let standings = rank(&raid);
        // Ledger order puts "late" first; joined_at still wins.
        assert_eq!(standings[0].user_id, UserId::from("early"));
        assert_eq!(standings[1].user_id, UserId::from("late"));
        assert_eq!(standings[0].damage, standings[1].damage);
    }

    #[test]
    fn same_millisecond_ties_fall_back_to_ledger_order() {
        let mut raid = raid(1_000);
        hit(&mut raid, "zed", 7, 2_000);
        hit(&mut raid, "amy", 7, 2_000);

        let standings = rank(&raid);
        assert_eq!(standings[0].user_id, UserId::from("zed"));
        assert_eq!(standings[1].user_id, UserId::from("amy"));
        assert_eq!(rank(&raid), standings);
    }

    #[test]
    fn top_and_standing_views() {
        let mut raid = raid(1_000);
        for (i, damage) in [5, 40, 20, 10].into_iter().enumerate() {
            hit(&mut raid, &format!("u{i}"), damage, 2_000 + i as u64);
        }

        let top2 = top(&raid, 2);
        assert_eq!(top2.len(), 2);
        assert_eq!(top2[0].user_id, UserId::from("u1"));
        assert_eq!(top2[1].user_id, UserId::from("u2"));
        assert_eq!(top(&raid, 50).len(), 4);

        let own = standing(&raid, &UserId::from("u0")).unwrap();
        assert_eq!(own.rank, 4);
        assert_eq!(own.damage, 5);
        assert!(standing(&raid, &UserId::from("nobody")).is_none());
    }

    #[test]
    fn user_stats_aggregate_across_raids() {
        let alice = UserId::from("alice");

        let mut won = raid(40);
        hit(&mut won, "alice", 25, 2_000);
        hit(&mut won, "bob", 15, 2_001);
        assert_eq!(won.status(), RaidStatus::Defeated);

        let mut lost = Raid::new(RaidId(2), crate::state::fixtures::spec(1_000), Timestamp(0)).unwrap();
        hit(&mut lost, "alice", 10, 2_000);
        hit(&mut lost, "alice", 12, 2_001);
        assert!(lost.claim_expiry(lost.ends_at()));

        let mut skipped = Raid::new(RaidId(3), crate::state::fixtures::spec(1_000), Timestamp(0)).unwrap();
        hit(&mut skipped, "bob", 1, 2_000);

        let stats = UserRaidStats::collect(&alice, [&won, &lost, &skipped]);
        assert_eq!(stats.raids_participated, 2);
        assert_eq!(stats.victories, 1);
        assert_eq!(stats.total_damage, 47);
        assert_eq!(stats.total_attacks, 3);
        assert_eq!(stats.average_damage_per_raid, 23);
        assert_eq!(stats.best_attack, 25);
    }

    #[test]
    fn user_without_raids_has_zeroed_stats() {
        let stats = UserRaidStats::collect(&UserId::from("ghost"), std::iter::empty());
        assert_eq!(stats.raids_participated, 0);
        assert_eq!(stats.average_damage_per_raid, 0);
    }
}
