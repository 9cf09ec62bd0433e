//! Metadata store for Corral.
//!
//! Durable keyed records of every managed instance. Each operation is an
//! atomic single-record transaction; the store knows nothing about the
//! container runtime beyond the shared instance name.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod index;
pub mod json;
pub mod lock;
pub mod memory;

use corral_common::error::Result;
use corral_common::types::{InstanceId, InstanceRecord, NewInstance};

pub use json::JsonFileStore;
pub use lock::{FileLock, LockMode};
pub use memory::MemoryStore;

/// Keyed CRUD over instance records.
pub trait MetadataStore: Send + Sync {
    /// Inserts a record and assigns its id.
    ///
    /// # Errors
    ///
    /// `DuplicateName` if another record has the same name,
    /// `StoreUnavailable` if the record cannot be persisted.
    fn insert(&self, instance: NewInstance) -> Result<InstanceRecord>;

    /// Looks a record up by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_by_id(&self, id: InstanceId) -> Result<Option<InstanceRecord>>;

    /// Looks a record up by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_by_name(&self, name: &str) -> Result<Option<InstanceRecord>>;

    /// Returns up to `limit` records ordered by id, skipping `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list(&self, offset: usize, limit: usize) -> Result<Vec<InstanceRecord>>;

    /// Replaces the record with the same id.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id is unknown, `DuplicateName` if the new name
    /// belongs to another record, `StoreUnavailable` on persistence failure.
    fn update(&self, record: &InstanceRecord) -> Result<InstanceRecord>;

    /// Deletes a record and returns it.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id is unknown, `StoreUnavailable` on persistence
    /// failure.
    fn delete(&self, id: InstanceId) -> Result<InstanceRecord>;

    /// Short backend name for logs and diagnostics.
    fn kind(&self) -> &'static str;
}
