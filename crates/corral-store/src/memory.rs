//! Volatile metadata store.

use std::sync::{Mutex, MutexGuard};

use corral_common::error::{CorralError, Result};
use corral_common::types::{InstanceId, InstanceRecord, NewInstance};

use crate::MetadataStore;
use crate::index::StateIndex;

/// Metadata store that keeps the index in memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    index: Mutex<StateIndex>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StateIndex>> {
        self.index.lock().map_err(|_| CorralError::StoreUnavailable {
            message: "memory store lock poisoned".into(),
        })
    }
}

impl MetadataStore for MemoryStore {
    fn insert(&self, instance: NewInstance) -> Result<InstanceRecord> {
        self.lock()?.insert(instance)
    }

    fn get_by_id(&self, id: InstanceId) -> Result<Option<InstanceRecord>> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn get_by_name(&self, name: &str) -> Result<Option<InstanceRecord>> {
        Ok(self.lock()?.get_by_name(name).cloned())
    }

    fn list(&self, offset: usize, limit: usize) -> Result<Vec<InstanceRecord>> {
        Ok(self.lock()?.page(offset, limit))
    }

    fn update(&self, record: &InstanceRecord) -> Result<InstanceRecord> {
        self.lock()?.update(record)
    }

    fn delete(&self, id: InstanceId) -> Result<InstanceRecord> {
        self.lock()?.delete(id)
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
