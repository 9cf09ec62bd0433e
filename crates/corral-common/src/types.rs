//! Domain primitive types used across the Corral workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CorralError, Result};

/// Maximum accepted length of an instance name.
pub const MAX_NAME_LEN: usize = 128;

/// Unique identifier of an instance record, assigned by the metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Last-observed runtime state of an instance.
///
/// Only ever written as the outcome of a successful runtime operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    /// The container is running.
    Running,
    /// The container exists but is stopped.
    Stopped,
}

impl InstanceStatus {
    /// Status implied by the `is_active` flag.
    #[must_use]
    pub const fn for_active(is_active: bool) -> Self {
        if is_active { Self::Running } else { Self::Stopped }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Resource limits for an instance, in caller units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Memory cap in MiB.
    pub memory_limit_mb: u32,
    /// Number of CPUs the instance may use.
    pub cpu_count: u32,
}

impl ResourceLimits {
    /// Memory cap in bytes.
    #[must_use]
    pub const fn memory_bytes(&self) -> u64 {
        self.memory_limit_mb as u64 * 1024 * 1024
    }

    /// CPU quota in microseconds per scheduling period of `period_us`.
    #[must_use]
    pub const fn cpu_quota(&self, period_us: u64) -> u64 {
        self.cpu_count as u64 * period_us
    }
}

/// Declared configuration of an instance, as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSpec {
    /// Instance name, also used as the container name.
    pub name: String,
    /// Memory cap in MiB.
    pub memory_limit_mb: u32,
    /// Number of CPUs.
    pub cpu_count: u32,
    /// Whether the container should be running.
    pub is_active: bool,
}

impl InstanceSpec {
    /// Resource limits declared by this spec.
    #[must_use]
    pub const fn limits(&self) -> ResourceLimits {
        ResourceLimits {
            memory_limit_mb: self.memory_limit_mb,
            cpu_count: self.cpu_count,
        }
    }

    /// Validates the spec and returns a copy with a normalized name.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::InvalidSpec`] if a limit is zero or the name
    /// is not a valid container name.
    pub fn validated(&self) -> Result<Self> {
        if self.memory_limit_mb == 0 {
            return Err(CorralError::invalid_spec("memory_limit_mb must be positive"));
        }
        if self.cpu_count == 0 {
            return Err(CorralError::invalid_spec("cpu_count must be positive"));
        }
        let name = self.name.trim();
        validate_name(name)?;
        Ok(Self {
            name: name.to_string(),
            ..self.clone()
        })
    }
}

/// Checks that `name` is usable as a container name.
///
/// # Errors
///
/// Returns [`CorralError::InvalidSpec`] describing the first violated rule.
pub fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(CorralError::invalid_spec("name must not be empty"));
    };
    if name.len() > MAX_NAME_LEN {
        return Err(CorralError::invalid_spec(format!(
            "name exceeds {MAX_NAME_LEN} characters"
        )));
    }
    if !first.is_ascii_alphanumeric() {
        return Err(CorralError::invalid_spec(format!(
            "name must start with a letter or digit: {name}"
        )));
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))) {
        return Err(CorralError::invalid_spec(format!(
            "name contains invalid character {bad:?}: {name}"
        )));
    }
    Ok(())
}

/// Durable record of a managed instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Store-assigned identifier.
    pub id: InstanceId,
    /// Unique name, shared with the runtime container.
    pub name: String,
    /// Memory cap in MiB.
    pub memory_limit_mb: u32,
    /// Number of CPUs.
    pub cpu_count: u32,
    /// Whether the container is expected to be running.
    pub is_active: bool,
    /// Result of the most recent successful runtime operation.
    pub status: InstanceStatus,
}

impl InstanceRecord {
    /// Resource limits recorded for this instance.
    #[must_use]
    pub const fn limits(&self) -> ResourceLimits {
        ResourceLimits {
            memory_limit_mb: self.memory_limit_mb,
            cpu_count: self.cpu_count,
        }
    }
}

/// A record awaiting insertion; the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInstance {
    /// Unique name.
    pub name: String,
    /// Memory cap in MiB.
    pub memory_limit_mb: u32,
    /// Number of CPUs.
    pub cpu_count: u32,
    /// Whether the container is expected to be running.
    pub is_active: bool,
    /// Status produced by the creating runtime operation.
    pub status: InstanceStatus,
}

impl NewInstance {
    /// Builds the insertable form of a validated spec.
    #[must_use]
    pub fn from_spec(spec: &InstanceSpec, status: InstanceStatus) -> Self {
        Self {
            name: spec.name.clone(),
            memory_limit_mb: spec.memory_limit_mb,
            cpu_count: spec.cpu_count,
            is_active: spec.is_active,
            status,
        }
    }

    /// Attaches an identifier, producing the stored record.
    #[must_use]
    pub fn with_id(self, id: InstanceId) -> InstanceRecord {
        InstanceRecord {
            id,
            name: self.name,
            memory_limit_mb: self.memory_limit_mb,
            cpu_count: self.cpu_count,
            is_active: self.is_active,
            status: self.status,
        }
    }
}
