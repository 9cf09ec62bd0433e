//! # corral-core
//!
//! The lifecycle coordinator: creates, updates, toggles, and deletes
//! instances by driving the container runtime and the metadata store in a
//! fixed order, compensating runtime changes when the store write fails.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use corral_common::types::InstanceSpec;
//! use corral_core::{Coordinator, CoordinatorOptions};
//! use corral_runtime::backend::memory::MemoryRuntime;
//! use corral_store::MemoryStore;
//!
//! let coordinator = Coordinator::new(
//!     Arc::new(MemoryRuntime::new()),
//!     Arc::new(MemoryStore::new()),
//!     CoordinatorOptions::default(),
//! );
//! let web1 = coordinator.create(&InstanceSpec {
//!     name: "web1".into(),
//!     memory_limit_mb: 256,
//!     cpu_count: 1,
//!     is_active: true,
//! })?;
//! let stopped = coordinator.toggle(web1.id)?;
//! # Ok::<(), corral_common::error::CorralError>(())
//! ```

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod coordinator;
pub mod lock;
pub mod reconcile;

pub use coordinator::{Coordinator, CoordinatorOptions};
pub use reconcile::{ReconcileMode, ReconcileReport};
