//! Advisory file locks shared between `corral` processes.
//!
//! Every process using one index file coordinates through sidecar lock
//! files next to it. Locks are released when the guard drops or the
//! process exits.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use corral_common::error::{CorralError, Result};
use fs2::FileExt;

/// Lock mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Many holders at once; excludes `Exclusive`.
    Shared,
    /// A single holder.
    Exclusive,
}

/// Held advisory lock on a file, released on drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl FileLock {
    /// Blocks until `path` is locked in `mode`, creating the file and its
    /// directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the file cannot be opened or locked.
    pub fn acquire(path: &Path, mode: LockMode) -> Result<Self> {
        let unavailable = |what: &str, e: std::io::Error| CorralError::StoreUnavailable {
            message: format!("{what} {}: {e}", path.display()),
        };
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| unavailable("creating directory for", e))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| unavailable("opening lock file", e))?;

        match mode {
            LockMode::Shared => FileExt::lock_shared(&file),
            LockMode::Exclusive => FileExt::lock_exclusive(&file),
        }
        .map_err(|e| unavailable("locking", e))?;

        tracing::trace!(path = %path.display(), ?mode, "file lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            mode,
        })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release file lock");
        }
        tracing::trace!(path = %self.path.display(), mode = ?self.mode, "file lock released");
    }
}

/// Sidecar path `<file>.<suffix>` next to `path`.
pub(crate) fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;

    #[test]
    fn sidecar_sits_next_to_index() {
        assert_eq!(
            sidecar(Path::new("/var/lib/corral/instances.json"), "lock"),
            PathBuf::from("/var/lib/corral/instances.json.lock")
        );
    }

    #[test]
    fn exclusive_lock_waits_for_holder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("x.lock");
        let released = AtomicBool::new(false);

        let held = FileLock::acquire(&path, LockMode::Exclusive).unwrap();
        std::thread::scope(|s| {
            let waiter = s.spawn(|| {
                let _lock = FileLock::acquire(&path, LockMode::Exclusive).unwrap();
                released.load(Ordering::SeqCst)
            });
            std::thread::sleep(Duration::from_millis(100));
            released.store(true, Ordering::SeqCst);
            drop(held);
            assert!(waiter.join().unwrap(), "second holder entered early");
        });
    }

    #[test]
    fn shared_locks_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.lock");
        let _a = FileLock::acquire(&path, LockMode::Shared).unwrap();
        let _b = FileLock::acquire(&path, LockMode::Shared).unwrap();
    }
}
