//! System-wide constants and default paths.

use std::path::PathBuf;
use std::sync::OnceLock;

/// Default base directory when no home directory is usable.
pub const SYSTEM_DATA_DIR: &str = "/var/lib/corral";

/// Returns the data directory, preferring `$HOME/.corral` and falling
/// back to `/var/lib/corral`.
fn resolve_data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        let user_dir = PathBuf::from(home).join(".corral");
        if std::fs::create_dir_all(&user_dir).is_ok() {
            return user_dir;
        }
    }
    PathBuf::from(SYSTEM_DATA_DIR)
}

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the resolved data directory for this session.
pub fn data_dir() -> &'static PathBuf {
    DATA_DIR.get_or_init(resolve_data_dir)
}

/// File name of the metadata index inside the data directory.
pub const STATE_FILE_NAME: &str = "instances.json";

/// Container runtime CLI invoked by the Docker backend.
pub const DEFAULT_RUNTIME_BINARY: &str = "docker";

/// Fixed base image every instance is created from.
pub const DEFAULT_IMAGE: &str = "alpine";

/// Long-lived idle process keeping an instance container alive.
pub const DEFAULT_COMMAND: [&str; 2] = ["sleep", "infinity"];

/// Upper bound for a single runtime call, in seconds.
pub const DEFAULT_RUNTIME_TIMEOUT_SECS: u64 = 30;

/// CFS scheduling period used to express CPU quotas, in microseconds.
pub const DEFAULT_CPU_PERIOD_US: u64 = 100_000;

/// Default page size for listing instances.
pub const DEFAULT_LIST_LIMIT: usize = 100;
