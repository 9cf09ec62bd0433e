//! JSON-file metadata store.
//!
//! The index file is the only copy of the records. Every call reads it
//! fresh under a shared lock on the `<index>.lock` sidecar, and every
//! mutation rereads, changes, and rewrites it under an exclusive lock, so
//! separate `corral` processes never overwrite each other's records.
//!
//! Writes go to a temporary file in the same directory, which is then
//! atomically renamed over the old one. A reader therefore sees either the
//! previous or the new index, never a torn write.

use std::io::Write;
use std::path::{Path, PathBuf};

use corral_common::error::{CorralError, Result};
use corral_common::types::{InstanceId, InstanceRecord, NewInstance};

use crate::MetadataStore;
use crate::index::{StateFile, StateIndex};
use crate::lock::{self, FileLock, LockMode};

/// Metadata store persisted as a JSON index file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    index_lock: PathBuf,
    operation_lock: PathBuf,
}

impl JsonFileStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let store = Self {
            index_lock: lock::sidecar(&path, "lock"),
            operation_lock: lock::sidecar(&path, "ops.lock"),
            path,
        };
        let index = store.read()?;
        tracing::debug!(path = %store.path.display(), records = index.len(), "opened metadata store");
        Ok(store)
    }

    /// Serializes whole lifecycle operations across processes.
    ///
    /// Holding the returned lock keeps every other holder of this index's
    /// operation lock waiting, so a runtime change and its record write
    /// are never interleaved with another process's. Record reads and
    /// writes stay available to the holder.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the lock file cannot be locked.
    pub fn lock_operations(&self) -> Result<FileLock> {
        tracing::debug!(path = %self.operation_lock.display(), "waiting for operation lock");
        FileLock::acquire(&self.operation_lock, LockMode::Exclusive)
    }

    fn read(&self) -> Result<StateIndex> {
        if !self.path.exists() {
            return Ok(StateIndex::default());
        }
        let _lock = FileLock::acquire(&self.index_lock, LockMode::Shared)?;
        load_index(&self.path)
    }

    /// Rereads the index, applies `op`, and persists the result, all under
    /// the exclusive index lock. A failed op or write leaves the file as it
    /// was.
    fn mutate<T>(&self, op: impl FnOnce(&mut StateIndex) -> Result<T>) -> Result<T> {
        let _lock = FileLock::acquire(&self.index_lock, LockMode::Exclusive)?;
        let mut index = load_index(&self.path)?;
        let out = op(&mut index)?;
        save_index(&self.path, &index)?;
        Ok(out)
    }
}

impl MetadataStore for JsonFileStore {
    fn insert(&self, instance: NewInstance) -> Result<InstanceRecord> {
        let record = self.mutate(|index| index.insert(instance))?;
        tracing::debug!(id = %record.id, name = %record.name, "record inserted");
        Ok(record)
    }

    fn get_by_id(&self, id: InstanceId) -> Result<Option<InstanceRecord>> {
        Ok(self.read()?.get(id).cloned())
    }

    fn get_by_name(&self, name: &str) -> Result<Option<InstanceRecord>> {
        Ok(self.read()?.get_by_name(name).cloned())
    }

    fn list(&self, offset: usize, limit: usize) -> Result<Vec<InstanceRecord>> {
        Ok(self.read()?.page(offset, limit))
    }

    fn update(&self, record: &InstanceRecord) -> Result<InstanceRecord> {
        let record = self.mutate(|index| index.update(record))?;
        tracing::debug!(id = %record.id, name = %record.name, "record updated");
        Ok(record)
    }

    fn delete(&self, id: InstanceId) -> Result<InstanceRecord> {
        let record = self.mutate(|index| index.delete(id))?;
        tracing::debug!(id = %record.id, name = %record.name, "record deleted");
        Ok(record)
    }

    fn kind(&self) -> &'static str {
        "json"
    }
}

/// Loads the index from disk; a missing file is an empty index.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_index(path: &Path) -> Result<StateIndex> {
    tracing::debug!(path = %path.display(), "loading state index");
    if !path.exists() {
        return Ok(StateIndex::default());
    }
    let content = std::fs::read_to_string(path).map_err(|e| CorralError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    if content.trim().is_empty() {
        return Ok(StateIndex::default());
    }
    let file: StateFile = serde_json::from_str(&content)?;
    StateIndex::from_file(file)
}

/// Persists the index to disk atomically.
///
/// # Errors
///
/// Returns `StoreUnavailable` if the file cannot be written.
pub fn save_index(path: &Path, index: &StateIndex) -> Result<()> {
    tracing::debug!(path = %path.display(), records = index.len(), "saving state index");
    let unavailable = |what: &str, e: &dyn std::fmt::Display| CorralError::StoreUnavailable {
        message: format!("{what} {}: {e}", path.display()),
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| unavailable("creating directory for", &e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .map_err(|e| unavailable("creating temporary file for", &e))?;
    serde_json::to_writer_pretty(&mut tmp, &index.to_file())
        .map_err(|e| unavailable("serializing", &e))?;
    tmp.write_all(b"\n")
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| unavailable("writing", &e))?;
    let _ = tmp
        .persist(path)
        .map_err(|e| unavailable("replacing", &e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use corral_common::types::InstanceStatus;

    use super::*;

    fn new(name: &str) -> NewInstance {
        NewInstance {
            name: name.into(),
            memory_limit_mb: 256,
            cpu_count: 1,
            is_active: true,
            status: InstanceStatus::Running,
        }
    }

    #[test]
    fn open_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("instances.json")).unwrap();
        assert!(store.list(0, 10).unwrap().is_empty());
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("instances.json");
        {
            let store = JsonFileStore::open(&path).unwrap();
            let rec = store.insert(new("web1")).unwrap();
            let mut changed = rec.clone();
            changed.is_active = false;
            changed.status = InstanceStatus::Stopped;
            let _ = store.update(&changed).unwrap();
            let _ = store.insert(new("web2")).unwrap();
        }
        let store = JsonFileStore::open(&path).unwrap();
        let web1 = store.get_by_name("web1").unwrap().unwrap();
        assert_eq!(web1.id.get(), 1);
        assert_eq!(web1.status, InstanceStatus::Stopped);
        assert_eq!(store.insert(new("web3")).unwrap().id.get(), 3);
    }

    #[test]
    fn file_uses_lowercase_status() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instances.json");
        let store = JsonFileStore::open(&path).unwrap();
        let _ = store.insert(new("web1")).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"status\": \"running\""));
        assert!(content.contains("\"next_id\": 2"));
    }

    #[test]
    fn unwritable_location_fails_insert() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        // The parent of the index path is a regular file, so every write fails.
        let store = JsonFileStore::open(blocker.join("instances.json")).unwrap();
        assert!(matches!(
            store.insert(new("web1")),
            Err(CorralError::StoreUnavailable { .. })
        ));
        assert!(store.get_by_name("web1").unwrap().is_none());
    }

    #[test]
    fn rejected_mutation_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instances.json");
        let store = JsonFileStore::open(&path).unwrap();
        let _ = store.insert(new("web1")).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        assert!(matches!(
            store.insert(new("web1")),
            Err(CorralError::DuplicateName { .. })
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instances.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(CorralError::Serialization { .. })
        ));
    }
}
