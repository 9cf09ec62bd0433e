//! Per-key mutual exclusion for lifecycle operations.
//!
//! Each instance id and each instance name maps to its own lock slot, so
//! operations on the same instance run one at a time while operations on
//! different instances proceed in parallel. Slots are created on demand and
//! dropped again once nobody holds or waits for them.
//!
//! Callers must acquire keys in ascending [`LockKey`] order (at most one id,
//! then names sorted). [`KeyedLocks::lock_all`] does this for one batch; an
//! operation that locks in two batches must only add keys greater than the
//! ones it already holds.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use corral_common::types::InstanceId;

/// A lockable key. Ids order before names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    /// Store identifier of an instance.
    Id(InstanceId),
    /// Instance name, which is also the container name.
    Name(String),
}

#[derive(Debug, Default)]
struct Slot {
    held: Mutex<bool>,
    released: Condvar,
}

/// Table of lock slots keyed by [`LockKey`].
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<LockKey, Arc<Slot>>>,
}

// The mutexes here guard only a flag and the slot table, both of which are
// consistent at every unlock point, so a poisoned lock is safe to re-enter.
fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl KeyedLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until `key` is held exclusively by the caller.
    pub fn lock(&self, key: LockKey) -> KeyGuard<'_> {
        let slot = {
            let mut slots = relock(&self.slots);
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        {
            let mut held = relock(&slot.held);
            while *held {
                held = slot
                    .released
                    .wait(held)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            *held = true;
        }
        tracing::trace!(?key, "lock acquired");
        KeyGuard {
            table: self,
            key,
            slot,
        }
    }

    /// Acquires every key in `keys`, in ascending order, skipping duplicates.
    pub fn lock_all(&self, keys: impl IntoIterator<Item = LockKey>) -> Vec<KeyGuard<'_>> {
        let mut keys: Vec<LockKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();
        keys.into_iter().map(|key| self.lock(key)).collect()
    }

    /// Number of live slots; slots disappear once released and unwanted.
    #[must_use]
    pub fn len(&self) -> usize {
        relock(&self.slots).len()
    }

    /// Returns `true` when no key is held or awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: &LockKey, slot: &Arc<Slot>) {
        *relock(&slot.held) = false;
        slot.released.notify_one();

        let mut slots = relock(&self.slots);
        // One reference lives in the table and one in the releasing guard;
        // any extra reference belongs to a waiter that still needs the slot.
        if Arc::strong_count(slot) == 2 && !*relock(&slot.held) {
            let _ = slots.remove(key);
        }
    }
}

/// Exclusive hold on one key, released on drop.
#[derive(Debug)]
pub struct KeyGuard<'a> {
    table: &'a KeyedLocks,
    key: LockKey,
    slot: Arc<Slot>,
}

impl KeyGuard<'_> {
    /// The key this guard holds.
    #[must_use]
    pub const fn key(&self) -> &LockKey {
        &self.key
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.table.release(&self.key, &self.slot);
        tracing::trace!(key = ?self.key, "lock released");
    }
}
