//! Deterministic raid rules and data types shared across the workspace.
//!
//! `raid-core` defines the canonical shared-boss rules: how a loadout turns
//! into damage, how damage is credited against a raid's finite HP pool, and how
//! standings are derived from the ledger. Everything here is pure; the runtime
//! crate layers storage, concurrency control and background workers on top.
//!
//! All HP mutation flows through [`Raid::apply_attack`] and
//! [`Raid::claim_expiry`], which own the conservation invariant.
pub mod combat;
pub mod config;
pub mod error;
pub mod items;
pub mod leaderboard;
pub mod ledger;
pub mod rng;
pub mod state;

pub use combat::{DamageRoll, Loadout, LoadoutError, calculate_damage, compute_damage};
pub use config::CombatParams;
pub use error::{ErrorSeverity, RaidError};
pub use items::{ItemCatalog, ItemDefinition, ItemId, ItemStats, StaticItemCatalog};
pub use leaderboard::{Standing, UserRaidStats, rank, standing, top};
pub use ledger::{AttackOutcome, InactiveReason, LedgerError};
pub use rng::{FixedRolls, PcgRng, RandomSource, compute_seed};
pub use state::{
    AttackRecord, BossProfile, BossStats, Participant, Raid, RaidId, RaidRewards, RaidSpec,
    RaidSpecError, RaidStatus, Timestamp, UserId,
};
