//! In-process runtime backend.
//!
//! Keeps containers as entries in a map with the same naming, idempotency,
//! and error semantics as the Docker backend. Used by tests and dry runs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use corral_common::error::{CorralError, Result};
use corral_common::types::ResourceLimits;

use super::{ContainerSpec, RuntimeAdapter, RuntimeHandle, RuntimeState};

/// A simulated container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryContainer {
    /// Runtime-assigned identifier.
    pub container_id: String,
    /// Image the container was created from.
    pub image: String,
    /// Limits currently applied.
    pub limits: ResourceLimits,
    /// Whether the container is running.
    pub running: bool,
}

/// Runtime backend that holds containers in memory.
#[derive(Debug, Default)]
pub struct MemoryRuntime {
    containers: Mutex<BTreeMap<String, MemoryContainer>>,
    next_id: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryRuntime {
    /// Creates an empty runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `RuntimeUnavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns a copy of the named container, if present.
    #[must_use]
    pub fn container(&self, name: &str) -> Option<MemoryContainer> {
        self.containers
            .lock()
            .ok()
            .and_then(|map| map.get(name).cloned())
    }

    /// Names of all containers, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.containers
            .lock()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, MemoryContainer>>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CorralError::RuntimeUnavailable {
                message: "memory runtime marked unavailable".into(),
            });
        }
        self.containers.lock().map_err(|_| CorralError::RuntimeUnavailable {
            message: "memory runtime lock poisoned".into(),
        })
    }

    fn with_container<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut MemoryContainer) -> T,
    ) -> Result<T> {
        let mut map = self.lock()?;
        map.get_mut(name)
            .map(f)
            .ok_or_else(|| CorralError::RuntimeNotFound {
                name: name.to_string(),
            })
    }
}

impl RuntimeAdapter for MemoryRuntime {
    fn create(&self, spec: &ContainerSpec) -> Result<RuntimeHandle> {
        let mut map = self.lock()?;
        if map.contains_key(&spec.name) {
            return Err(CorralError::RuntimeConflict {
                name: spec.name.clone(),
                message: format!("container name {} is already in use", spec.name),
            });
        }
        if spec.limits.memory_limit_mb == 0 || spec.limits.cpu_count == 0 {
            return Err(CorralError::RuntimeRejected {
                message: "resource limits must be positive".into(),
            });
        }
        let container_id = format!("mem-{:08x}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let _ = map.insert(
            spec.name.clone(),
            MemoryContainer {
                container_id: container_id.clone(),
                image: spec.image.clone(),
                limits: spec.limits,
                running: true,
            },
        );
        tracing::debug!(name = %spec.name, %container_id, "memory container created");
        Ok(RuntimeHandle {
            container_id,
            name: spec.name.clone(),
        })
    }

    fn rename(&self, old_name: &str, new_name: &str) -> Result<()> {
        let mut map = self.lock()?;
        if !map.contains_key(old_name) {
            return Err(CorralError::RuntimeNotFound {
                name: old_name.to_string(),
            });
        }
        if old_name == new_name {
            return Ok(());
        }
        if map.contains_key(new_name) {
            return Err(CorralError::RuntimeConflict {
                name: new_name.to_string(),
                message: format!("container name {new_name} is already in use"),
            });
        }
        if let Some(container) = map.remove(old_name) {
            let _ = map.insert(new_name.to_string(), container);
        }
        Ok(())
    }

    fn start(&self, name: &str) -> Result<()> {
        self.with_container(name, |c| c.running = true)
    }

    fn stop(&self, name: &str) -> Result<()> {
        self.with_container(name, |c| c.running = false)
    }

    fn remove(&self, name: &str) -> Result<()> {
        let mut map = self.lock()?;
        if map.remove(name).is_none() {
            tracing::debug!(name, "container already absent");
        }
        Ok(())
    }

    fn inspect(&self, name: &str) -> Result<RuntimeState> {
        let map = self.lock()?;
        Ok(match map.get(name) {
            Some(c) if c.running => RuntimeState::Running,
            Some(_) => RuntimeState::Stopped,
            None => RuntimeState::Absent,
        })
    }

    fn update_limits(&self, name: &str, limits: &ResourceLimits) -> Result<()> {
        self.with_container(name, |c| c.limits = *limits)
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
