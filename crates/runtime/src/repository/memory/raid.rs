//! In-memory RaidRepository implementation for tests and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use raid_core::{AttackRecord, Raid, RaidId};

use crate::repository::{RaidRepository, RepositoryError, Result, VersionedRaid};

struct Slot {
    current: VersionedRaid,
    attacks: Vec<AttackRecord>,
}

/// In-memory implementation of RaidRepository.
///
/// Each raid lives in its own mutex-guarded slot. The outer map lock is only
/// held long enough to find the slot, so commits on different raids proceed
/// independently.
pub struct InMemoryRaidRepository {
    slots: RwLock<HashMap<RaidId, Arc<Mutex<Slot>>>>,
    next_id: AtomicU64,
}

impl InMemoryRaidRepository {
    /// Create a new empty in-memory repository.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn slot(&self, id: RaidId) -> Result<Option<Arc<Mutex<Slot>>>> {
        let slots = self
            .slots
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(slots.get(&id).cloned())
    }
}

impl Default for InMemoryRaidRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl RaidRepository for InMemoryRaidRepository {
    fn next_id(&self) -> Result<RaidId> {
        Ok(RaidId(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    fn insert(&self, raid: &Raid) -> Result<()> {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        if slots.contains_key(&raid.id()) {
            return Err(RepositoryError::RaidExists { raid_id: raid.id() });
        }
        // Keep generated ids ahead of externally chosen ones.
        self.next_id.fetch_max(raid.id().0 + 1, Ordering::Relaxed);
        slots.insert(
            raid.id(),
            Arc::new(Mutex::new(Slot {
                current: VersionedRaid {
                    raid: raid.clone(),
                    version: 0,
                },
                attacks: Vec::new(),
            })),
        );
        Ok(())
    }

    fn load(&self, id: RaidId) -> Result<Option<VersionedRaid>> {
        let Some(slot) = self.slot(id)? else {
            return Ok(None);
        };
        let slot = slot.lock().map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(Some(slot.current.clone()))
    }

    fn commit(
        &self,
        expected_version: u64,
        raid: &Raid,
        record: Option<&AttackRecord>,
    ) -> Result<u64> {
        let raid_id = raid.id();
        let slot = self
            .slot(raid_id)?
            .ok_or(RepositoryError::RaidNotFound { raid_id })?;
        let mut slot = slot.lock().map_err(|_| RepositoryError::LockPoisoned)?;

        if slot.current.version != expected_version {
            return Err(RepositoryError::VersionConflict {
                raid_id,
                expected: expected_version,
                actual: slot.current.version,
            });
        }

        let version = expected_version + 1;
        slot.current = VersionedRaid {
            raid: raid.clone(),
            version,
        };
        if let Some(record) = record {
            slot.attacks.push(record.clone());
        }
        Ok(version)
    }

    fn attacks(&self, id: RaidId) -> Result<Vec<AttackRecord>> {
        let slot = self
            .slot(id)?
            .ok_or(RepositoryError::RaidNotFound { raid_id: id })?;
        let slot = slot.lock().map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(slot.attacks.clone())
    }

    fn list_ids(&self) -> Result<Vec<RaidId>> {
        let slots = self
            .slots
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        let mut ids: Vec<_> = slots.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }
}
