//! Advisory working-directory lock
//!
//! A cooperative sentinel file (`.progy/sync.lock`) holding the owner's pid
//! and acquisition time. Well-behaved progy processes acquire it before any
//! mutating sequence and hold it across the whole fetch+layer+commit+pull+
//! push window. Acquisition is non-blocking: contention is reported to the
//! caller, never queued or retried.
//!
//! A lock whose owner is dead, or older than [`STALE_LOCK_AGE`], is treated
//! as abandoned and broken with a warning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ProgyError, Result};

/// Lock file location relative to the working directory
pub const LOCK_FILE: &str = ".progy/sync.lock";

/// Age beyond which a lock is considered abandoned
pub const STALE_LOCK_AGE: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockFile {
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// RAII guard over the advisory lock. Releases on drop, so the lock is
/// freed even when the guarded operation errors.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    /// Try to acquire the lock for `workdir` without blocking.
    ///
    /// Returns [`ProgyError::LockContention`] when another live process
    /// holds a fresh lock. A stale lock is broken and re-acquired.
    pub fn try_acquire(workdir: &Path) -> Result<Self> {
        let path = workdir.join(LOCK_FILE);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        match Self::create_lock(&path) {
            Ok(guard) => Ok(guard),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let existing = Self::read_lock(&path);
                match existing {
                    Some(lock) if !Self::is_stale(&lock) => Err(ProgyError::LockContention {
                        lock_path: path,
                        holder_pid: lock.pid,
                        acquired_at: lock.acquired_at.to_rfc3339(),
                    }),
                    Some(lock) => {
                        warn!(
                            "Breaking stale sync lock (pid {}, acquired {})",
                            lock.pid, lock.acquired_at
                        );
                        std::fs::remove_file(&path)?;
                        Self::create_lock(&path).map_err(ProgyError::Io)
                    }
                    None => {
                        warn!("Breaking unreadable sync lock at {:?}", path);
                        std::fs::remove_file(&path)?;
                        Self::create_lock(&path).map_err(ProgyError::Io)
                    }
                }
            }
            Err(e) => Err(ProgyError::Io(e)),
        }
    }

    /// Whether a lock is currently held for `workdir`
    pub fn is_locked(workdir: &Path) -> bool {
        workdir.join(LOCK_FILE).exists()
    }

    fn create_lock(path: &Path) -> std::io::Result<Self> {
        let lock = LockFile {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };

        // create_new makes acquisition atomic across cooperating processes
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        let content = serde_json::to_string_pretty(&lock)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;

        debug!("Acquired sync lock at {:?} (pid {})", path, lock.pid);
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn read_lock(path: &Path) -> Option<LockFile> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Abandoned when the owning process is gone or the lock outlived
    /// [`STALE_LOCK_AGE`]
    fn is_stale(lock: &LockFile) -> bool {
        if !Self::pid_alive(lock.pid) {
            return true;
        }
        let age = Utc::now().signed_duration_since(lock.acquired_at);
        age.to_std().map(|a| a > STALE_LOCK_AGE).unwrap_or(false)
    }

    #[cfg(target_os = "linux")]
    fn pid_alive(pid: u32) -> bool {
        Path::new("/proc").join(pid.to_string()).exists()
    }

    #[cfg(not(target_os = "linux"))]
    fn pid_alive(_pid: u32) -> bool {
        // No portable liveness probe; fall back to age-only staleness
        true
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            // Already gone is fine (a stale-lock breaker may have raced us)
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to release sync lock {:?}: {}", self.path, e);
            }
        } else {
            debug!("Released sync lock at {:?}", self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn acquire_and_release() {
        let temp = TempDir::new().unwrap();

        {
            let _guard = LockGuard::try_acquire(temp.path()).unwrap();
            assert!(LockGuard::is_locked(temp.path()));
        }

        // Released on drop
        assert!(!LockGuard::is_locked(temp.path()));
    }

    #[test]
    fn second_acquire_reports_contention() {
        let temp = TempDir::new().unwrap();
        let _guard = LockGuard::try_acquire(temp.path()).unwrap();

        let err = LockGuard::try_acquire(temp.path()).unwrap_err();
        match err {
            ProgyError::LockContention { holder_pid, .. } => {
                assert_eq!(holder_pid, std::process::id());
            }
            other => panic!("expected LockContention, got {other:?}"),
        }
    }

    #[test]
    fn relock_after_release_succeeds() {
        let temp = TempDir::new().unwrap();

        drop(LockGuard::try_acquire(temp.path()).unwrap());
        let second = LockGuard::try_acquire(temp.path());
        assert!(second.is_ok());
    }

    #[test]
    fn stale_lock_by_age_is_broken() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(LOCK_FILE);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        let stale = LockFile {
            pid: std::process::id(),
            acquired_at: Utc::now() - chrono::Duration::minutes(30),
        };
        std::fs::write(&path, serde_json::to_string(&stale).unwrap()).unwrap();

        // Held by a live pid but too old, so it is broken and re-acquired
        let guard = LockGuard::try_acquire(temp.path());
        assert!(guard.is_ok());
    }

    #[test]
    fn dead_pid_lock_is_broken() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(LOCK_FILE);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        let dead = LockFile {
            // pid_max on linux defaults well below this
            pid: u32::MAX - 1,
            acquired_at: Utc::now(),
        };
        std::fs::write(&path, serde_json::to_string(&dead).unwrap()).unwrap();

        if cfg!(target_os = "linux") {
            assert!(LockGuard::try_acquire(temp.path()).is_ok());
        }
    }

    #[test]
    fn unreadable_lock_is_broken() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(LOCK_FILE);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        assert!(LockGuard::try_acquire(temp.path()).is_ok());
    }
}
