//! In-memory instance index shared by every store backend.
//!
//! Holds the records and the id counter, and enforces the single-record
//! rules (id assignment, name uniqueness, existence checks). Backends only
//! decide where the index lives.

use std::collections::BTreeMap;

use corral_common::error::{CorralError, Result};
use corral_common::types::{InstanceId, InstanceRecord, NewInstance};
use serde::{Deserialize, Serialize};

/// On-disk format version of the index.
pub const INDEX_VERSION: u32 = 1;

/// Records keyed by id plus the next id to hand out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateIndex {
    next_id: u64,
    records: BTreeMap<InstanceId, InstanceRecord>,
}

impl Default for StateIndex {
    fn default() -> Self {
        Self {
            next_id: 1,
            records: BTreeMap::new(),
        }
    }
}

/// Serialized form of [`StateIndex`].
#[derive(Debug, Serialize, Deserialize)]
pub struct StateFile {
    /// Format version.
    pub version: u32,
    /// Next id to assign.
    pub next_id: u64,
    /// All records, ordered by id.
    pub instances: Vec<InstanceRecord>,
}

impl StateIndex {
    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the index holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn name_taken(&self, name: &str, except: Option<InstanceId>) -> bool {
        self.records
            .values()
            .any(|r| r.name == name && Some(r.id) != except)
    }

    /// Inserts a record under a fresh id.
    ///
    /// # Errors
    ///
    /// `DuplicateName` if the name is already used.
    pub fn insert(&mut self, instance: NewInstance) -> Result<InstanceRecord> {
        if self.name_taken(&instance.name, None) {
            return Err(CorralError::DuplicateName {
                name: instance.name,
            });
        }
        let id = InstanceId::new(self.next_id);
        self.next_id += 1;
        let record = instance.with_id(id);
        let _ = self.records.insert(id, record.clone());
        Ok(record)
    }

    /// Returns the record with `id`.
    #[must_use]
    pub fn get(&self, id: InstanceId) -> Option<&InstanceRecord> {
        self.records.get(&id)
    }

    /// Returns the record named `name`.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&InstanceRecord> {
        self.records.values().find(|r| r.name == name)
    }

    /// Returns a page of records ordered by id.
    #[must_use]
    pub fn page(&self, offset: usize, limit: usize) -> Vec<InstanceRecord> {
        self.records
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Replaces an existing record.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id is unknown, `DuplicateName` if the name is used
    /// by a different record.
    pub fn update(&mut self, record: &InstanceRecord) -> Result<InstanceRecord> {
        if !self.records.contains_key(&record.id) {
            return Err(CorralError::NotFound { id: record.id });
        }
        if self.name_taken(&record.name, Some(record.id)) {
            return Err(CorralError::DuplicateName {
                name: record.name.clone(),
            });
        }
        let _ = self.records.insert(record.id, record.clone());
        Ok(record.clone())
    }

    /// Removes a record.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id is unknown.
    pub fn delete(&mut self, id: InstanceId) -> Result<InstanceRecord> {
        self.records.remove(&id).ok_or(CorralError::NotFound { id })
    }

    /// Converts the index into its serialized form.
    #[must_use]
    pub fn to_file(&self) -> StateFile {
        StateFile {
            version: INDEX_VERSION,
            next_id: self.next_id,
            instances: self.records.values().cloned().collect(),
        }
    }

    /// Rebuilds an index from its serialized form.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the file has an unknown version or violates the
    /// id or name invariants.
    pub fn from_file(file: StateFile) -> Result<Self> {
        if file.version != INDEX_VERSION {
            return Err(CorralError::StoreUnavailable {
                message: format!("unsupported index version {}", file.version),
            });
        }
        let mut index = Self {
            next_id: file.next_id.max(1),
            records: BTreeMap::new(),
        };
        for record in file.instances {
            if record.id.get() >= index.next_id {
                index.next_id = record.id.get() + 1;
            }
            if index.name_taken(&record.name, None) || index.records.contains_key(&record.id) {
                return Err(CorralError::StoreUnavailable {
                    message: format!("corrupt index: duplicate entry for {}", record.name),
                });
            }
            let _ = index.records.insert(record.id, record);
        }
        Ok(index)
    }
}
