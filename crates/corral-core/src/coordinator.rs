//! Lifecycle coordinator.
//!
//! Every mutating operation touches two stores that can fail independently:
//! the container runtime and the metadata store. The coordinator runs each
//! operation as a fixed sequence of steps under per-instance locks:
//!
//! 1. validate input and load the record,
//! 2. apply the change to the runtime,
//! 3. persist the record.
//!
//! A runtime failure aborts before anything is persisted. A store failure
//! after runtime changes triggers best-effort compensation that undoes those
//! changes in reverse order. Once a runtime change has been issued the
//! operation always runs to completion or compensation.

use std::sync::Arc;

use corral_common::config::CorralConfig;
use corral_common::error::{CorralError, Result};
use corral_common::types::{
    InstanceId, InstanceRecord, InstanceSpec, InstanceStatus, NewInstance, ResourceLimits,
};
use corral_runtime::{ContainerSpec, RuntimeAdapter};
use corral_store::MetadataStore;

use crate::lock::{KeyGuard, KeyedLocks, LockKey};

/// Fixed settings applied to every instance the coordinator manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorOptions {
    /// Base image for every container.
    pub image: String,
    /// Idle command keeping each container alive.
    pub command: Vec<String>,
    /// Push changed resource limits to live containers on update.
    pub apply_live_limits: bool,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self::from(&CorralConfig::default())
    }
}

impl From<&CorralConfig> for CoordinatorOptions {
    fn from(config: &CorralConfig) -> Self {
        Self {
            image: config.runtime.image.clone(),
            command: config.runtime.command.clone(),
            apply_live_limits: config.apply_live_limits,
        }
    }
}

/// A runtime change that has been applied and can be reverted.
#[derive(Debug, Clone)]
enum Applied {
    Created { name: String },
    Renamed { from: String, to: String },
    Started { name: String },
    Stopped { name: String },
    Limits { name: String, previous: ResourceLimits },
}

/// Orchestrates instance lifecycle across the runtime and the metadata store.
pub struct Coordinator {
    runtime: Arc<dyn RuntimeAdapter>,
    store: Arc<dyn MetadataStore>,
    options: CoordinatorOptions,
    locks: KeyedLocks,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("runtime", &self.runtime.kind())
            .field("store", &self.store.kind())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Creates a coordinator owning the given runtime adapter and store.
    #[must_use]
    pub fn new(
        runtime: Arc<dyn RuntimeAdapter>,
        store: Arc<dyn MetadataStore>,
        options: CoordinatorOptions,
    ) -> Self {
        tracing::debug!(
            runtime = runtime.kind(),
            store = store.kind(),
            image = %options.image,
            "coordinator ready"
        );
        Self {
            runtime,
            store,
            options,
            locks: KeyedLocks::new(),
        }
    }

    pub(crate) fn runtime(&self) -> &dyn RuntimeAdapter {
        self.runtime.as_ref()
    }

    pub(crate) fn store(&self) -> &dyn MetadataStore {
        self.store.as_ref()
    }

    /// Creates a container for `spec` and records it.
    ///
    /// # Errors
    ///
    /// `InvalidSpec` for bad input, `DuplicateName` if a record already uses
    /// the name, any runtime error from container creation, or the store
    /// error if the record cannot be written (the container is removed again).
    pub fn create(&self, spec: &InstanceSpec) -> Result<InstanceRecord> {
        let spec = spec.validated()?;
        let _guard = self.locks.lock(LockKey::Name(spec.name.clone()));

        if self.store.get_by_name(&spec.name)?.is_some() {
            return Err(CorralError::DuplicateName { name: spec.name });
        }

        let handle = self.runtime.create(&self.container_spec(&spec.name, spec.limits()))?;
        tracing::info!(
            name = %spec.name,
            container_id = %handle.container_id,
            "container created"
        );
        // Removing the container undoes everything that follows it.
        let applied = vec![Applied::Created {
            name: spec.name.clone(),
        }];

        let status = if spec.is_active {
            InstanceStatus::Running
        } else {
            if let Err(e) = self.runtime.stop(&spec.name) {
                self.compensate(applied, &e);
                return Err(e);
            }
            InstanceStatus::Stopped
        };

        match self.store.insert(NewInstance::from_spec(&spec, status)) {
            Ok(record) => {
                tracing::info!(id = %record.id, name = %record.name, %status, "instance created");
                Ok(record)
            }
            Err(e) => {
                self.compensate(applied, &e);
                Err(e)
            }
        }
    }

    /// Applies a new declaration to an existing instance.
    ///
    /// A changed name is renamed in the runtime first. A changed `is_active`
    /// starts or stops the container. Changed limits are pushed to the live
    /// container only when `apply_live_limits` is set; otherwise they are
    /// only recorded.
    ///
    /// # Errors
    ///
    /// `InvalidSpec`, `NotFound`, `DuplicateName` if another record has the
    /// new name, any runtime error (record untouched), or a store error
    /// (runtime changes reverted).
    pub fn update(&self, id: InstanceId, spec: &InstanceSpec) -> Result<InstanceRecord> {
        let spec = spec.validated()?;
        let (current, _guards) = self.lock_instance(id, Some(&spec.name))?;

        let renamed = current.name != spec.name;
        if renamed {
            if let Some(other) = self.store.get_by_name(&spec.name)? {
                tracing::debug!(id = %id, other = %other.id, "rename target taken");
                return Err(CorralError::DuplicateName { name: spec.name });
            }
        }

        let mut applied = Vec::new();
        if let Err(e) = self.apply_update(&current, &spec, &mut applied) {
            self.compensate(applied, &e);
            return Err(e);
        }

        let mut next = current;
        next.name.clone_from(&spec.name);
        next.memory_limit_mb = spec.memory_limit_mb;
        next.cpu_count = spec.cpu_count;
        if next.is_active != spec.is_active {
            next.is_active = spec.is_active;
            next.status = InstanceStatus::for_active(spec.is_active);
        }

        match self.store.update(&next) {
            Ok(record) => {
                tracing::info!(
                    id = %record.id,
                    name = %record.name,
                    renamed,
                    status = %record.status,
                    "instance updated"
                );
                Ok(record)
            }
            Err(e) => {
                self.compensate(applied, &e);
                Err(e)
            }
        }
    }

    fn apply_update(
        &self,
        current: &InstanceRecord,
        spec: &InstanceSpec,
        applied: &mut Vec<Applied>,
    ) -> Result<()> {
        if current.name != spec.name {
            self.runtime.rename(&current.name, &spec.name)?;
            applied.push(Applied::Renamed {
                from: current.name.clone(),
                to: spec.name.clone(),
            });
        }
        if current.is_active != spec.is_active {
            if spec.is_active {
                self.runtime.start(&spec.name)?;
                applied.push(Applied::Started {
                    name: spec.name.clone(),
                });
            } else {
                self.runtime.stop(&spec.name)?;
                applied.push(Applied::Stopped {
                    name: spec.name.clone(),
                });
            }
        }
        if self.options.apply_live_limits && current.limits() != spec.limits() {
            self.runtime.update_limits(&spec.name, &spec.limits())?;
            applied.push(Applied::Limits {
                name: spec.name.clone(),
                previous: current.limits(),
            });
        }
        Ok(())
    }

    /// Starts a stopped instance or stops a running one.
    ///
    /// # Errors
    ///
    /// `NotFound`, any runtime error (record untouched), or a store error
    /// (runtime change reverted).
    pub fn toggle(&self, id: InstanceId) -> Result<InstanceRecord> {
        let (current, _guards) = self.lock_instance(id, None)?;

        let (applied, status) = if current.is_active {
            self.runtime.stop(&current.name)?;
            (
                Applied::Stopped {
                    name: current.name.clone(),
                },
                InstanceStatus::Stopped,
            )
        } else {
            self.runtime.start(&current.name)?;
            (
                Applied::Started {
                    name: current.name.clone(),
                },
                InstanceStatus::Running,
            )
        };

        let mut next = current;
        next.is_active = !next.is_active;
        next.status = status;

        match self.store.update(&next) {
            Ok(record) => {
                tracing::info!(id = %record.id, name = %record.name, status = %record.status, "instance toggled");
                Ok(record)
            }
            Err(e) => {
                self.compensate(vec![applied], &e);
                Err(e)
            }
        }
    }

    /// Removes the container and then the record.
    ///
    /// # Errors
    ///
    /// `NotFound`, a runtime error other than absence (record kept), or a
    /// store error after the container is gone.
    pub fn delete(&self, id: InstanceId) -> Result<InstanceRecord> {
        let (current, _guards) = self.lock_instance(id, None)?;

        match self.runtime.remove(&current.name) {
            Ok(()) => {}
            Err(CorralError::RuntimeNotFound { .. }) => {
                tracing::warn!(id = %id, name = %current.name, "container already absent");
            }
            Err(e) => return Err(e),
        }

        match self.store.delete(id) {
            Ok(record) => {
                tracing::info!(id = %record.id, name = %record.name, "instance deleted");
                Ok(record)
            }
            Err(e) => {
                // The container is gone; the dangling record is left for
                // reconciliation to recreate or for a retried delete.
                tracing::error!(id = %id, name = %current.name, error = %e, "record kept after container removal");
                Err(e)
            }
        }
    }

    /// Returns one record.
    ///
    /// # Errors
    ///
    /// `NotFound` if no record has this id.
    pub fn get(&self, id: InstanceId) -> Result<InstanceRecord> {
        self.load(id)
    }

    /// Returns a page of records ordered by id.
    ///
    /// # Errors
    ///
    /// Returns a store error if the records cannot be read.
    pub fn list(&self, offset: usize, limit: usize) -> Result<Vec<InstanceRecord>> {
        self.store.list(offset, limit)
    }

    /// Closes the runtime adapter.
    ///
    /// # Errors
    ///
    /// Returns the adapter's shutdown error.
    pub fn shutdown(&self) -> Result<()> {
        tracing::debug!(runtime = self.runtime.kind(), "shutting down coordinator");
        self.runtime.close()
    }

    pub(crate) fn load(&self, id: InstanceId) -> Result<InstanceRecord> {
        self.store
            .get_by_id(id)?
            .ok_or(CorralError::NotFound { id })
    }

    /// Locks `id`, loads its record, then locks the record's name and, if
    /// given, a second name the operation will move the instance to.
    pub(crate) fn lock_instance(
        &self,
        id: InstanceId,
        new_name: Option<&str>,
    ) -> Result<(InstanceRecord, Vec<KeyGuard<'_>>)> {
        let id_guard = self.locks.lock(LockKey::Id(id));
        let record = self.load(id)?;
        let names = std::iter::once(record.name.clone())
            .chain(new_name.map(ToString::to_string))
            .map(LockKey::Name);
        let mut guards = vec![id_guard];
        guards.extend(self.locks.lock_all(names));
        Ok((record, guards))
    }

    pub(crate) fn container_spec(&self, name: &str, limits: ResourceLimits) -> ContainerSpec {
        ContainerSpec {
            name: name.to_string(),
            image: self.options.image.clone(),
            command: self.options.command.clone(),
            limits,
        }
    }

    /// Reverts applied runtime changes, newest first. Failures are logged
    /// and do not replace the error that triggered compensation.
    fn compensate(&self, applied: Vec<Applied>, cause: &CorralError) {
        for step in applied.into_iter().rev() {
            tracing::warn!(?step, %cause, "compensating runtime change");
            let outcome = match &step {
                Applied::Created { name } => self.runtime.remove(name),
                Applied::Renamed { from, to } => self.runtime.rename(to, from),
                Applied::Started { name } => self.runtime.stop(name),
                Applied::Stopped { name } => self.runtime.start(name),
                Applied::Limits { name, previous } => self.runtime.update_limits(name, previous),
            };
            if let Err(e) = outcome {
                tracing::error!(?step, error = %e, "compensation failed; runtime and records may diverge");
            }
        }
    }
}
