//! Ledger transitions for a single raid.
//!
//! These are the only functions that mutate HP, participants or status. Each
//! one either applies completely or returns an error with the raid untouched,
//! so a caller can run it on a private copy and publish the copy atomically
//! (see the runtime's compare-and-swap commit).
//!
//! # Closure claims
//!
//! - `active -> defeated` happens inside [`Raid::apply_attack`], in the same
//!   transition that drives HP to zero. The outcome reports `killing_blow`
//!   for exactly that attack.
//! - `active -> expired` happens in [`Raid::claim_expiry`], guarded on
//!   `status == Active`. It returns `true` for exactly one caller.

use crate::combat::DamageRoll;
use crate::error::{ErrorSeverity, RaidError};
use crate::items::ItemId;
use crate::state::{AttackRecord, Participant, Raid, RaidId, RaidStatus, Timestamp, UserId};

/// Why a raid refused an attack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InactiveReason {
    /// The attack window has not opened yet.
    NotStarted,
    /// The window has passed but the expiry claim has not run yet.
    WindowClosed,
    /// Boss HP reached zero.
    Defeated,
    /// The raid was closed by expiry.
    Expired,
}

/// Ledger rejections.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("{raid_id} is not accepting attacks ({reason})")]
    NotActive {
        raid_id: RaidId,
        reason: InactiveReason,
    },
}

impl RaidError for LedgerError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotActive { .. } => ErrorSeverity::Validation,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::NotActive { .. } => "RAID_NOT_ACTIVE",
        }
    }
}

/// Result of one accepted attack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttackOutcome {
    /// The appended ledger entry.
    pub record: AttackRecord,

    /// Attacker's cumulative credited damage after this attack.
    pub user_total: u64,

    /// This attack drove HP to zero and claimed the `defeated` transition.
    pub killing_blow: bool,
}

impl Raid {
    /// Reason this raid would reject an attack at `now`, if any.
    pub fn inactive_reason(&self, now: Timestamp) -> Option<InactiveReason> {
        match self.status {
            RaidStatus::Defeated => Some(InactiveReason::Defeated),
            RaidStatus::Expired => Some(InactiveReason::Expired),
            RaidStatus::Active if self.current_hp == 0 => Some(InactiveReason::Defeated),
            RaidStatus::Active if now < self.starts_at() => Some(InactiveReason::NotStarted),
            RaidStatus::Active if now >= self.ends_at() => Some(InactiveReason::WindowClosed),
            RaidStatus::Active => None,
        }
    }

    /// Apply one attack.
    ///
    /// Credits `min(roll.damage, current_hp)` to `user_id`, decrements HP by the
    /// same amount and appends an [`AttackRecord`]. When HP reaches zero the
    /// raid flips to `Defeated` in the same step and the outcome is marked as
    /// the killing blow.
    ///
    /// Zero-damage rolls against a live boss are accepted and recorded.
    pub fn apply_attack(
        &mut self,
        user_id: &UserId,
        roll: DamageRoll,
        items: &[ItemId],
        now: Timestamp,
    ) -> Result<AttackOutcome, LedgerError> {
        if let Some(reason) = self.inactive_reason(now) {
            return Err(LedgerError::NotActive {
                raid_id: self.id(),
                reason,
            });
        }

        let credited = (roll.damage as u64).min(self.current_hp) as u32;
        let seq = self.attack_count;

        self.current_hp -= credited as u64;
        self.attack_count += 1;

        let participant = self
            .participants
            .entry(user_id.clone())
            .or_insert_with(|| Participant::join(user_id.clone(), seq, now));
        participant.record_hit(credited, now, items);
        let user_total = participant.damage;

        let killing_blow = self.current_hp == 0;
        if killing_blow {
            self.status = RaidStatus::Defeated;
            self.closed_at = Some(now);
        }

        debug_assert!(self.is_conserved(), "conservation violated on {}", self.id());

        Ok(AttackOutcome {
            record: AttackRecord {
                raid_id: self.id(),
                seq,
                user_id: user_id.clone(),
                damage: credited,
                requested_damage: roll.damage,
                is_critical: roll.is_critical,
                at: now,
                hp_after: self.current_hp,
            },
            user_total,
            killing_blow,
        })
    }

    /// Claim the `active -> expired` transition.
    ///
    /// Returns `true` only if this call performed the transition: the raid was
    /// active, `now` is at or past `ends_at`, and HP remains.
    pub fn claim_expiry(&mut self, now: Timestamp) -> bool {
        if !self.is_expiry_due(now) {
            return false;
        }
        self.status = RaidStatus::Expired;
        self.closed_at = Some(now);
        true
    }
}
