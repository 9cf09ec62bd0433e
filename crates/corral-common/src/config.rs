//! Global configuration model for Corral.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{CorralError, Result};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorralConfig {
    /// Base directory for Corral state.
    pub data_dir: PathBuf,
    /// Path to the metadata index file; `<data_dir>/instances.json` if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
    /// Container runtime settings.
    pub runtime: RuntimeConfig,
    /// Push changed resource limits to live containers on update.
    pub apply_live_limits: bool,
}

impl Default for CorralConfig {
    fn default() -> Self {
        Self {
            data_dir: constants::data_dir().clone(),
            state_file: None,
            runtime: RuntimeConfig::default(),
            apply_live_limits: false,
        }
    }
}

impl CorralConfig {
    /// Loads configuration from a JSON file. Absent fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CorralError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.runtime.check()?;
        Ok(config)
    }

    /// Effective path of the metadata index file.
    #[must_use]
    pub fn state_file(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join(constants::STATE_FILE_NAME))
    }
}

/// Settings for the container runtime backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Runtime CLI binary name or path.
    pub binary: String,
    /// Base image for every instance.
    pub image: String,
    /// Idle command run inside each container.
    pub command: Vec<String>,
    /// Upper bound for a single runtime call, in seconds.
    pub timeout_secs: u64,
    /// CPU scheduling period in microseconds.
    pub cpu_period_us: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            binary: constants::DEFAULT_RUNTIME_BINARY.to_string(),
            image: constants::DEFAULT_IMAGE.to_string(),
            command: constants::DEFAULT_COMMAND.iter().map(ToString::to_string).collect(),
            timeout_secs: constants::DEFAULT_RUNTIME_TIMEOUT_SECS,
            cpu_period_us: constants::DEFAULT_CPU_PERIOD_US,
        }
    }
}

impl RuntimeConfig {
    /// Per-call timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn check(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(CorralError::Config {
                message: "runtime.timeout_secs must be positive".to_string(),
            });
        }
        if self.cpu_period_us == 0 {
            return Err(CorralError::Config {
                message: "runtime.cpu_period_us must be positive".to_string(),
            });
        }
        if self.image.is_empty() {
            return Err(CorralError::Config {
                message: "runtime.image must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
