//! Seeded raid and simulated attackers.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use raid_core::{
    BossProfile, BossStats, ItemDefinition, ItemStats, RaidId, RaidRewards, RaidSpec,
    StaticItemCatalog, Timestamp,
};
use raid_runtime::{AttackRequest, ErrorKind, RaidHandle};
use tracing::{debug, warn};

/// Developer tools the simulated attackers bring into the fight.
const ITEMS: [(&str, Option<ItemStats>); 6] = [
    (
        "mechanical-keyboard",
        Some(ItemStats {
            attack: 35,
            speed: 10,
        }),
    ),
    (
        "rubber-duck",
        Some(ItemStats {
            attack: 12,
            speed: 4,
        }),
    ),
    (
        "linter",
        Some(ItemStats {
            attack: 25,
            speed: 20,
        }),
    ),
    (
        "debugger",
        Some(ItemStats {
            attack: 40,
            speed: 6,
        }),
    ),
    (
        "stack-overflow-tab",
        Some(ItemStats {
            attack: 18,
            speed: 30,
        }),
    ),
    // No stats: falls back to the default item power.
    ("coffee", None),
];

pub fn catalog() -> StaticItemCatalog {
    ITEMS
        .iter()
        .map(|&(id, stats)| ItemDefinition::new(id, stats))
        .collect()
}

/// The jQuery Titan raid, opening at `now`.
pub fn titan(now: Timestamp, max_hp: u64, window: Duration) -> RaidSpec {
    RaidSpec {
        boss: BossProfile {
            name: "jQuery Titan".into(),
            title: "The Legacy Framework Awakens".into(),
            description: "A massive legacy framework rises from deprecated code. \
                          Unite with developers worldwide to modernize it."
                .into(),
            target_category: Some("frontend".into()),
        },
        stats: BossStats {
            attack: 50,
            defense: 30,
            speed: 20,
        },
        max_hp,
        starts_at: now,
        ends_at: now.plus_millis(window.as_millis() as u64),
        rewards: RaidRewards {
            participation_xp: 100,
            victory_xp: 500,
            top_damager_title: Some("Legacy Slayer".into()),
        },
    }
}

/// What one attacker achieved.
#[derive(Clone, Copy, Debug, Default)]
pub struct AttackerTally {
    pub landed: u32,
    pub damage: u64,
    pub rejected: u32,
    pub conflicts: u32,
    pub killing_blows: u32,
}

impl AttackerTally {
    pub fn absorb(&mut self, other: AttackerTally) {
        self.landed += other.landed;
        self.damage += other.damage;
        self.rejected += other.rejected;
        self.conflicts += other.conflicts;
        self.killing_blows += other.killing_blows;
    }
}

/// Attack `raid_id` up to `attacks` times with random loadouts.
///
/// Stops early once the raid is no longer active.
pub async fn run_attacker(
    handle: RaidHandle,
    raid_id: RaidId,
    user: String,
    attacks: u32,
    seed: u64,
) -> AttackerTally {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut tally = AttackerTally::default();

    for _ in 0..attacks {
        let count = rng.gen_range(1..=3);
        let items: Vec<&str> = ITEMS
            .choose_multiple(&mut rng, count)
            .map(|(id, _)| *id)
            .collect();

        match handle
            .attack(AttackRequest::new(raid_id, user.as_str(), items))
            .await
        {
            Ok(receipt) => {
                tally.landed += 1;
                tally.damage += u64::from(receipt.damage);
                tally.killing_blows += u32::from(receipt.killing_blow);
            }
            Err(err) if err.kind() == ErrorKind::InactiveRaid => {
                debug!(user = %user, error = %err, "Raid closed, attacker leaving");
                tally.rejected += 1;
                break;
            }
            Err(err) if err.is_transient() => {
                tally.conflicts += 1;
            }
            Err(err) => {
                warn!(user = %user, error = %err, "Attack failed");
                tally.rejected += 1;
            }
        }

        tokio::task::yield_now().await;
    }

    tally
}
