//! File-based RaidRepository implementation.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use raid_core::{AttackRecord, Raid, RaidId};

use super::log::AppendLog;
use crate::repository::{RaidRepository, RepositoryError, Result, VersionedRaid};

struct FileSlot {
    current: VersionedRaid,
    attacks: AppendLog<AttackRecord>,
}

/// File-based implementation of RaidRepository.
///
/// # File Format
///
/// ```text
/// {base_dir}/
///   ├── raids/
///   │   └── raid_{id}.bin       bincode VersionedRaid, replaced via temp + rename
///   └── attacks/
///       └── attacks_{id}.log    [u32 len][bincode AttackRecord] per entry
/// ```
///
/// A commit appends the attack record first and then replaces the raid file.
/// If the process dies between the two, the log holds a record whose `seq` is
/// not below the stored raid's `attack_count`. Such records are hidden on
/// read and shadowed by the next commit that reuses their `seq`, so the pair
/// always reflects one consistent commit.
pub struct FileRaidRepository {
    base_dir: PathBuf,
    slots: RwLock<HashMap<RaidId, Arc<Mutex<FileSlot>>>>,
    next_id: AtomicU64,
}

impl FileRaidRepository {
    /// Open the repository rooted at `base_dir`, loading every stored raid.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(base_dir.join("raids")).map_err(RepositoryError::Io)?;
        fs::create_dir_all(base_dir.join("attacks")).map_err(RepositoryError::Io)?;

        let repo = Self {
            base_dir,
            slots: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        };
        repo.load_existing()?;
        Ok(repo)
    }

    fn raid_path(&self, id: RaidId) -> PathBuf {
        self.base_dir.join("raids").join(format!("raid_{}.bin", id.0))
    }

    fn attacks_path(&self, id: RaidId) -> PathBuf {
        self.base_dir
            .join("attacks")
            .join(format!("attacks_{}.log", id.0))
    }

    fn load_existing(&self) -> Result<()> {
        let entries = fs::read_dir(self.base_dir.join("raids")).map_err(RepositoryError::Io)?;
        let mut slots = self
            .slots
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;

        for entry in entries {
            let path = entry.map_err(RepositoryError::Io)?.path();
            let Some(id) = path
                .file_name()
                .and_then(|s| s.to_str())
                .and_then(|name| name.strip_prefix("raid_"))
                .and_then(|s| s.strip_suffix(".bin"))
                .and_then(|s| s.parse::<u64>().ok())
            else {
                continue;
            };

            let bytes = fs::read(&path).map_err(RepositoryError::Io)?;
            let current: VersionedRaid = bincode::deserialize(&bytes)
                .map_err(|e| RepositoryError::CorruptedData(e.to_string()))?;
            if current.raid.id() != RaidId(id) {
                return Err(RepositoryError::CorruptedData(format!(
                    "{} holds {}",
                    path.display(),
                    current.raid.id()
                )));
            }

            let attacks = AppendLog::open_or_create(self.attacks_path(RaidId(id)))?;
            self.next_id.fetch_max(id + 1, Ordering::Relaxed);
            slots.insert(
                RaidId(id),
                Arc::new(Mutex::new(FileSlot { current, attacks })),
            );
        }

        tracing::debug!(
            "Loaded {} raid(s) from {}",
            slots.len(),
            self.base_dir.display()
        );
        Ok(())
    }

    fn write_raid(&self, current: &VersionedRaid) -> Result<()> {
        let path = self.raid_path(current.raid.id());
        let temp_path = path.with_extension("bin.tmp");

        let bytes = bincode::serialize(current)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        fs::write(&temp_path, bytes).map_err(RepositoryError::Io)?;

        // Atomic rename
        fs::rename(&temp_path, &path).map_err(RepositoryError::Io)?;

        Ok(())
    }

    fn slot(&self, id: RaidId) -> Result<Option<Arc<Mutex<FileSlot>>>> {
        let slots = self
            .slots
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(slots.get(&id).cloned())
    }
}

impl RaidRepository for FileRaidRepository {
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

        let current = VersionedRaid {
            raid: raid.clone(),
            version: 0,
        };
        self.write_raid(&current)?;
        let attacks = AppendLog::open_or_create(self.attacks_path(raid.id()))?;

        self.next_id.fetch_max(raid.id().0 + 1, Ordering::Relaxed);
        slots.insert(raid.id(), Arc::new(Mutex::new(FileSlot { current, attacks })));

        tracing::debug!("Saved {} to {}", raid.id(), self.raid_path(raid.id()).display());
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

        if let Some(record) = record {
            slot.attacks.append(record)?;
        }

        let next = VersionedRaid {
            raid: raid.clone(),
            version: expected_version + 1,
        };
        self.write_raid(&next)?;
        slot.current = next;

        Ok(expected_version + 1)
    }

    fn attacks(&self, id: RaidId) -> Result<Vec<AttackRecord>> {
        let slot = self
            .slot(id)?
            .ok_or(RepositoryError::RaidNotFound { raid_id: id })?;
        let slot = slot.lock().map_err(|_| RepositoryError::LockPoisoned)?;

        // An orphaned entry is superseded by the next commit with its seq.
        let committed = slot.current.raid.attack_count();
        let mut by_seq = BTreeMap::new();
        for record in slot.attacks.read_all()? {
            if record.seq < committed {
                by_seq.insert(record.seq, record);
            }
        }
        Ok(by_seq.into_values().collect())
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
