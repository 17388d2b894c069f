//! Repository layer for raid records.
//!
//! Repositories hold the only durable state in the system: one record per raid
//! plus its append-only attack log. All writes after creation go through
//! [`RaidRepository::commit`], which is versioned so concurrent writers can
//! detect each other.

mod error;
mod file;
mod memory;
mod traits;

pub use error::{RepositoryError, Result};
pub use file::{AppendLog, FileRaidRepository};
pub use memory::InMemoryRaidRepository;
pub use traits::{RaidRepository, VersionedRaid};

#[cfg(test)]
pub(crate) mod testing {
    use raid_core::{
        AttackRecord, BossProfile, BossStats, Raid, RaidId, RaidRewards, RaidSpec, Timestamp,
        UserId,
    };

    pub fn raid(id: RaidId, max_hp: u64) -> Raid {
        let spec = RaidSpec {
            boss: BossProfile {
                name: "jQuery Titan".into(),
                ..BossProfile::default()
            },
            stats: BossStats {
                attack: 50,
                defense: 30,
                speed: 20,
            },
            max_hp,
            starts_at: Timestamp(0),
            ends_at: Timestamp(60_000),
            rewards: RaidRewards::default(),
        };
        Raid::new(id, spec, Timestamp(0)).unwrap()
    }

    pub fn record(raid_id: RaidId, seq: u64, damage: u32) -> AttackRecord {
        AttackRecord {
            raid_id,
            seq,
            user_id: UserId::from("alice"),
            damage,
            requested_damage: damage,
            is_critical: false,
            at: Timestamp(1_000),
            hp_after: 0,
        }
    }
}
