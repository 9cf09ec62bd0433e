//! Test doubles wrapping the in-memory backends with fault injection.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use corral_common::error::{CorralError, Result};
use corral_common::types::{InstanceId, InstanceRecord, InstanceSpec, NewInstance, ResourceLimits};
use corral_core::{Coordinator, CoordinatorOptions};
use corral_runtime::backend::memory::MemoryRuntime;
use corral_runtime::{ContainerSpec, RuntimeAdapter, RuntimeHandle, RuntimeState};
use corral_store::{MemoryStore, MetadataStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Create,
    Rename,
    Start,
    Stop,
    Remove,
    Inspect,
    UpdateLimits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Conflict,
    NotFound,
    Rejected,
    Unavailable,
}

impl Fault {
    fn error(self, name: &str) -> CorralError {
        match self {
            Self::Conflict => CorralError::RuntimeConflict {
                name: name.into(),
                message: "injected conflict".into(),
            },
            Self::NotFound => CorralError::RuntimeNotFound { name: name.into() },
            Self::Rejected => CorralError::RuntimeRejected {
                message: "injected rejection".into(),
            },
            Self::Unavailable => CorralError::RuntimeUnavailable {
                message: "injected outage".into(),
            },
        }
    }
}

/// Memory runtime with per-operation faults, a call log, a per-call delay,
/// and a gauge of concurrently running calls.
#[derive(Debug, Default)]
pub struct FaultyRuntime {
    pub inner: MemoryRuntime,
    faults: Mutex<HashMap<Op, Fault>>,
    calls: Mutex<Vec<(Op, String)>>,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FaultyRuntime {
    pub fn fail(&self, op: Op, fault: Fault) {
        let _ = self.faults.lock().unwrap().insert(op, fault);
    }

    pub fn heal(&self) {
        self.faults.lock().unwrap().clear();
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> Vec<(Op, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn call<T>(&self, op: Op, name: &str, f: impl FnOnce(&MemoryRuntime) -> Result<T>) -> Result<T> {
        self.calls.lock().unwrap().push((op, name.to_string()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let fault = self.faults.lock().unwrap().get(&op).copied();
        let out = match fault {
            Some(fault) => Err(fault.error(name)),
            None => f(&self.inner),
        };
        let _ = self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

impl RuntimeAdapter for FaultyRuntime {
    fn create(&self, spec: &ContainerSpec) -> Result<RuntimeHandle> {
        self.call(Op::Create, &spec.name, |rt| rt.create(spec))
    }

    fn rename(&self, old_name: &str, new_name: &str) -> Result<()> {
        self.call(Op::Rename, old_name, |rt| rt.rename(old_name, new_name))
    }

    fn start(&self, name: &str) -> Result<()> {
        self.call(Op::Start, name, |rt| rt.start(name))
    }

    fn stop(&self, name: &str) -> Result<()> {
        self.call(Op::Stop, name, |rt| rt.stop(name))
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.call(Op::Remove, name, |rt| rt.remove(name))
    }

    fn inspect(&self, name: &str) -> Result<RuntimeState> {
        self.call(Op::Inspect, name, |rt| rt.inspect(name))
    }

    fn update_limits(&self, name: &str, limits: &ResourceLimits) -> Result<()> {
        self.call(Op::UpdateLimits, name, |rt| rt.update_limits(name, limits))
    }

    fn kind(&self) -> &'static str {
        "faulty"
    }
}

/// Memory store whose writes can be made to fail.
#[derive(Debug, Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    fail_writes: AtomicBool,
}

impl FaultyStore {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(CorralError::StoreUnavailable {
                message: "injected store outage".into(),
            })
        } else {
            Ok(())
        }
    }
}

impl MetadataStore for FaultyStore {
    fn insert(&self, instance: NewInstance) -> Result<InstanceRecord> {
        self.check()?;
        self.inner.insert(instance)
    }

    fn get_by_id(&self, id: InstanceId) -> Result<Option<InstanceRecord>> {
        self.inner.get_by_id(id)
    }

    fn get_by_name(&self, name: &str) -> Result<Option<InstanceRecord>> {
        self.inner.get_by_name(name)
    }

    fn list(&self, offset: usize, limit: usize) -> Result<Vec<InstanceRecord>> {
        self.inner.list(offset, limit)
    }

    fn update(&self, record: &InstanceRecord) -> Result<InstanceRecord> {
        self.check()?;
        self.inner.update(record)
    }

    fn delete(&self, id: InstanceId) -> Result<InstanceRecord> {
        self.check()?;
        self.inner.delete(id)
    }

    fn kind(&self) -> &'static str {
        "faulty"
    }
}

pub struct Harness {
    pub runtime: Arc<FaultyRuntime>,
    pub store: Arc<FaultyStore>,
    pub coordinator: Coordinator,
}

pub fn harness() -> Harness {
    harness_with(CoordinatorOptions::default())
}

pub fn harness_with(options: CoordinatorOptions) -> Harness {
    let runtime = Arc::new(FaultyRuntime::default());
    let store = Arc::new(FaultyStore::default());
    let coordinator = Coordinator::new(
        Arc::clone(&runtime) as Arc<dyn RuntimeAdapter>,
        Arc::clone(&store) as Arc<dyn MetadataStore>,
        options,
    );
    Harness {
        runtime,
        store,
        coordinator,
    }
}

pub fn spec(name: &str, memory_limit_mb: u32, cpu_count: u32, is_active: bool) -> InstanceSpec {
    InstanceSpec {
        name: name.into(),
        memory_limit_mb,
        cpu_count,
        is_active,
    }
}
