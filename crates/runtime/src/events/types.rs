//! Event types for different topics.

use raid_core::{AttackRecord, RaidId, RaidStatus, Timestamp};
use serde::{Deserialize, Serialize};

/// Events related to accepted attacks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AttackEvent {
    /// An attack was committed to the ledger
    AttackApplied {
        record: AttackRecord,
        /// Attacker's cumulative damage after this attack
        user_total: u64,
        killing_blow: bool,
    },
}

/// Events related to raid lifecycle transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// A raid was created in `Active` status
    RaidCreated {
        raid_id: RaidId,
        starts_at: Timestamp,
        ends_at: Timestamp,
    },

    /// A raid entered a terminal status. Emitted once per raid.
    RaidClosed {
        raid_id: RaidId,
        status: RaidStatus,
        closed_at: Timestamp,
        participants: usize,
    },
}

/// Events related to reward dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RewardEvent {
    /// The distributor accepted a raid's reward batch
    RewardDelivered { raid_id: RaidId, attempts: u32 },

    /// Every attempt failed; the batch is parked until retried
    RewardFailed {
        raid_id: RaidId,
        attempts: u32,
        error: String,
    },
}
