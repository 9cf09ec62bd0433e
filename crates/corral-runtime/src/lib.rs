//! Runtime adapter for Corral instances.
//!
//! Wraps a container runtime's control operations (create, rename, start,
//! stop, remove, inspect) behind [`backend::RuntimeAdapter`] and translates
//! runtime failures into the shared error taxonomy.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod backend;
pub mod exec;

pub use backend::{ContainerSpec, RuntimeAdapter, RuntimeHandle, RuntimeState};
