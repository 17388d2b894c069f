//! Append-only log file.
//!
//! `AppendLog<T>` stores items of any serializable type in the format:
//! ```text
//! [u32 length][bincode serialized T]
//! [u32 length][bincode serialized T]
//! ...
//! ```
//! It backs the per-raid attack logs.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};

use crate::repository::{RepositoryError, Result};

pub struct AppendLog<T> {
    /// Full path to the log file
    path: PathBuf,
    file: File,
    /// End of the last complete entry; the next write starts here
    current_offset: u64,
    _phantom: PhantomData<T>,
}

impl<T> AppendLog<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Open or create a log.
    ///
    /// Creates the parent directory and file if they don't exist, or opens the
    /// existing file for appending. A truncated trailing entry left by an
    /// interrupted write is cut off first.
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RepositoryError::Io)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(RepositoryError::Io)?;

        let file_len = file.metadata().map_err(RepositoryError::Io)?.len();
        let (_, valid_len) = scan::<T>(&path)?;
        if valid_len < file_len {
            tracing::warn!(
                "Truncating {} from {} to {} bytes",
                path.display(),
                file_len,
                valid_len
            );
            file.set_len(valid_len).map_err(RepositoryError::Io)?;
        }

        let current_offset = file.metadata().map_err(RepositoryError::Io)?.len();

        tracing::debug!(
            "Opened log: {} at offset {}",
            path.display(),
            current_offset
        );

        Ok(Self {
            path,
            file,
            current_offset,
            _phantom: PhantomData,
        })
    }

    /// Append an item and flush it to the file.
    ///
    /// The entry goes out in a single write. If that write fails the file is
    /// cut back to the previous entry, so a failed append leaves nothing
    /// behind for the next one to land after.
    ///
    /// Returns the byte offset where the item was written.
    pub fn append(&mut self, item: &T) -> Result<u64> {
        let offset = self.current_offset;

        let bytes =
            bincode::serialize(item).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let len = u32::try_from(bytes.len()).map_err(|_| {
            RepositoryError::Serialization(format!("entry of {} bytes too large", bytes.len()))
        })?;

        // [length][data]
        let mut entry = Vec::with_capacity(4 + bytes.len());
        entry.extend_from_slice(&len.to_le_bytes());
        entry.extend_from_slice(&bytes);

        if let Err(err) = self.file.write_all(&entry).and_then(|()| self.file.flush()) {
            if let Err(truncate) = self.rollback() {
                tracing::error!(
                    "Could not roll back {} to {} bytes: {}",
                    self.path.display(),
                    self.current_offset,
                    truncate
                );
            }
            return Err(RepositoryError::Io(err));
        }

        self.current_offset += entry.len() as u64;

        Ok(offset)
    }

    /// Cut the file back to the end of the last complete entry.
    fn rollback(&mut self) -> Result<()> {
        self.file
            .set_len(self.current_offset)
            .map_err(RepositoryError::Io)
    }

    /// Read every entry from the start of the file.
    pub fn read_all(&self) -> Result<Vec<T>> {
        scan(&self.path).map(|(items, _)| items)
    }

    /// Get the current size of the log in bytes.
    pub fn size(&self) -> u64 {
        self.current_offset
    }
}

/// Read complete entries, returning them with the byte length they cover.
fn scan<T: DeserializeOwned>(path: &Path) -> Result<(Vec<T>, u64)> {
    let file = File::open(path).map_err(RepositoryError::Io)?;
    let mut reader = BufReader::new(file);
    let mut items = Vec::new();
    let mut offset = 0u64;

    loop {
        let mut len_bytes = [0u8; 4];
        match reader.read_exact(&mut len_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(RepositoryError::Io(e)),
        }
        let len = u32::from_le_bytes(len_bytes) as usize;

        let mut data = vec![0u8; len];
        match reader.read_exact(&mut data) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(RepositoryError::Io(e)),
        }

        let item = bincode::deserialize(&data)
            .map_err(|e| RepositoryError::CorruptedData(e.to_string()))?;
        items.push(item);
        offset += 4 + len as u64;
    }

    Ok((items, offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestItem {
        id: u64,
        name: String,
    }

    fn item(id: u64) -> TestItem {
        TestItem {
            id,
            name: format!("item-{id}"),
        }
    }

    #[test]
    fn append_and_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let mut log = AppendLog::<TestItem>::open_or_create(temp_dir.path().join("a.log")).unwrap();

        assert_eq!(log.append(&item(1)).unwrap(), 0);
        let second = log.append(&item(2)).unwrap();
        assert!(second > 0);
        assert!(log.size() > second);

        assert_eq!(log.read_all().unwrap(), vec![item(1), item(2)]);
    }

    #[test]
    fn reopen_appends_after_existing_entries() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("b.log");
        {
            let mut log = AppendLog::<TestItem>::open_or_create(&path).unwrap();
            log.append(&item(1)).unwrap();
        }

        let mut log = AppendLog::<TestItem>::open_or_create(&path).unwrap();
        log.append(&item(2)).unwrap();
        assert_eq!(log.read_all().unwrap(), vec![item(1), item(2)]);
    }

    #[test]
    fn truncated_tail_is_cut_on_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("c.log");
        {
            let mut log = AppendLog::<TestItem>::open_or_create(&path).unwrap();
            log.append(&item(1)).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&100u32.to_le_bytes()).unwrap();
        file.write_all(&[1, 2, 3]).unwrap();

        let mut log = AppendLog::<TestItem>::open_or_create(&path).unwrap();
        assert_eq!(log.read_all().unwrap(), vec![item(1)]);

        log.append(&item(2)).unwrap();
        assert_eq!(log.read_all().unwrap(), vec![item(1), item(2)]);
    }

    #[test]
    fn failed_write_is_rolled_back_before_next_append() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("d.log");
        let mut log = AppendLog::<TestItem>::open_or_create(&path).unwrap();
        log.append(&item(1)).unwrap();
        let committed = log.size();

        // Half an entry, as a write that failed partway leaves it.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&64u32.to_le_bytes()).unwrap();
        file.write_all(&[9, 9]).unwrap();
        drop(file);

        log.rollback().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), committed);

        assert_eq!(log.append(&item(2)).unwrap(), committed);
        assert_eq!(log.read_all().unwrap(), vec![item(1), item(2)]);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), log.size());
    }
}
