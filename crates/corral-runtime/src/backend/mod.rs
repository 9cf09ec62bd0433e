//! Container runtime abstraction.
//!
//! The coordinator talks to the runtime only through [`RuntimeAdapter`].
//! Backends translate their native failures into the runtime variants of
//! [`corral_common::error::CorralError`] and never retry on their own.

pub mod docker;
pub mod memory;

use std::fmt;

use corral_common::config::RuntimeConfig;
use corral_common::error::Result;
use corral_common::types::ResourceLimits;

/// Configuration for creating an instance container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container name; identical to the instance name.
    pub name: String,
    /// Base image.
    pub image: String,
    /// Long-lived command run inside the container.
    pub command: Vec<String>,
    /// Memory and CPU caps.
    pub limits: ResourceLimits,
}

/// Reference to a container returned by [`RuntimeAdapter::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeHandle {
    /// Runtime-assigned container identifier.
    pub container_id: String,
    /// Container name.
    pub name: String,
}

/// Observed state of a named container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeState {
    /// The container exists and is running.
    Running,
    /// The container exists and is not running.
    Stopped,
    /// No container has this name.
    Absent,
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

/// Narrow control interface over a container runtime.
///
/// Implementors must be safe to call from many threads at once; the
/// coordinator serializes calls per container name.
pub trait RuntimeAdapter: Send + Sync {
    /// Creates and starts a detached container.
    ///
    /// # Errors
    ///
    /// `RuntimeConflict` if the name is taken, `RuntimeUnavailable` if the
    /// runtime cannot be reached, `RuntimeRejected` for any other refusal.
    fn create(&self, spec: &ContainerSpec) -> Result<RuntimeHandle>;

    /// Renames a container.
    ///
    /// # Errors
    ///
    /// `RuntimeNotFound` if `old_name` does not exist, `RuntimeConflict` if
    /// `new_name` is taken.
    fn rename(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// Starts a container. Starting a running container succeeds.
    ///
    /// # Errors
    ///
    /// `RuntimeNotFound` if the container does not exist.
    fn start(&self, name: &str) -> Result<()>;

    /// Stops a container. Stopping a stopped container succeeds.
    ///
    /// # Errors
    ///
    /// `RuntimeNotFound` if the container does not exist.
    fn stop(&self, name: &str) -> Result<()>;

    /// Force-removes a container. Removing an absent container succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime refuses or cannot be reached.
    fn remove(&self, name: &str) -> Result<()>;

    /// Reports whether a container exists and is running.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be queried.
    fn inspect(&self, name: &str) -> Result<RuntimeState>;

    /// Applies new resource limits to an existing container.
    ///
    /// # Errors
    ///
    /// `RuntimeNotFound` if the container does not exist, `RuntimeRejected`
    /// if the limits are refused.
    fn update_limits(&self, name: &str, limits: &ResourceLimits) -> Result<()>;

    /// Releases any resources held by the adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if shutdown fails.
    fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Short backend name for logs and diagnostics.
    fn kind(&self) -> &'static str;
}

/// Builds the Docker CLI backend described by `config`.
///
/// # Errors
///
/// Returns `RuntimeUnavailable` if the runtime binary cannot be located.
pub fn detect_runtime(config: &RuntimeConfig) -> Result<Box<dyn RuntimeAdapter>> {
    let backend = docker::DockerCli::from_config(config)?;
    tracing::info!(binary = %backend.binary().display(), "using docker runtime backend");
    Ok(Box::new(backend))
}
