use std::collections::BTreeSet;

use super::ids::{Timestamp, UserId};
use crate::items::ItemId;

/// Cumulative contribution of one user to one raid.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Participant {
    pub user_id: UserId,

    /// Total credited (post-clamp) damage.
    pub damage: u64,

    pub attack_count: u32,

    /// Largest single credited hit.
    pub best_attack: u32,

    /// Time of the user's first accepted attack.
    pub joined_at: Timestamp,

    /// Ledger sequence number of the first accepted attack. Breaks ties between
    /// participants that joined within the same millisecond.
    pub first_attack_seq: u64,

    pub last_attack_at: Timestamp,

    pub items_used: BTreeSet<ItemId>,
}

impl Participant {
    pub(crate) fn join(user_id: UserId, seq: u64, at: Timestamp) -> Self {
        Self {
            user_id,
            damage: 0,
            attack_count: 0,
            best_attack: 0,
            joined_at: at,
            first_attack_seq: seq,
            last_attack_at: at,
            items_used: BTreeSet::new(),
        }
    }

    pub(crate) fn record_hit(&mut self, credited: u32, at: Timestamp, items: &[ItemId]) {
        self.damage += credited as u64;
        self.attack_count += 1;
        self.best_attack = self.best_attack.max(credited);
        self.last_attack_at = at;
        self.items_used.extend(items.iter().cloned());
    }
}
