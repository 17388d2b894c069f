//! Repository contract for raid records and their attack logs.

use raid_core::{AttackRecord, Raid, RaidId, RaidStatus, Timestamp};

use super::error::Result;

/// A raid together with the version it was loaded at.
///
/// The version increments on every successful commit and is the token for
/// optimistic concurrency control.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VersionedRaid {
    pub raid: Raid,
    pub version: u64,
}

/// Durable storage for raids.
///
/// Implementations must make [`commit`](Self::commit) atomic: the raid record
/// and the optional attack record are either both stored or neither is, and
/// the write only succeeds if the stored version still equals
/// `expected_version`. Commits against different raids must not block each
/// other.
pub trait RaidRepository: Send + Sync {
    /// Allocate a fresh raid id.
    fn next_id(&self) -> Result<RaidId>;

    /// Store a newly created raid at version 0.
    fn insert(&self, raid: &Raid) -> Result<()>;

    /// Load a raid and its current version.
    fn load(&self, id: RaidId) -> Result<Option<VersionedRaid>>;

    /// Compare-and-swap `raid` over the stored record, appending `record` to
    /// the raid's attack log in the same step.
    ///
    /// Returns the new version, or [`RepositoryError::VersionConflict`] when
    /// another writer got there first.
    ///
    /// [`RepositoryError::VersionConflict`]: super::RepositoryError::VersionConflict
    fn commit(
        &self,
        expected_version: u64,
        raid: &Raid,
        record: Option<&AttackRecord>,
    ) -> Result<u64>;

    /// Accepted attacks for a raid, in sequence order.
    fn attacks(&self, id: RaidId) -> Result<Vec<AttackRecord>>;

    /// All stored raid ids, ascending.
    fn list_ids(&self) -> Result<Vec<RaidId>>;

    /// All stored raids, ascending by id.
    fn list(&self) -> Result<Vec<VersionedRaid>> {
        let mut raids = Vec::new();
        for id in self.list_ids()? {
            if let Some(raid) = self.load(id)? {
                raids.push(raid);
            }
        }
        Ok(raids)
    }

    /// Raids still `Active` whose window has opened by `now`, ordered by
    /// `starts_at` then id.
    ///
    /// Includes raids past `ends_at` that nobody has expired yet; callers run
    /// the expiry claim on those.
    fn find_active(&self, now: Timestamp) -> Result<Vec<VersionedRaid>> {
        let mut raids: Vec<_> = self
            .list()?
            .into_iter()
            .filter(|v| v.raid.status() == RaidStatus::Active && v.raid.starts_at() <= now)
            .collect();
        raids.sort_by_key(|v| (v.raid.starts_at(), v.raid.id()));
        Ok(raids)
    }
}
