//! Cooperative repository lock
//!
//! At most one transaction may run per repository. The lock is a marker file
//! in the control area recording owner, host, pid, transaction id, and
//! acquisition time; `create_new` semantics make acquisition atomic. A marker
//! left behind by a crashed process on this host is reclaimed automatically;
//! a live holder is reported immediately, never waited on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::{Error, Result};

/// Marker file name inside the control directory
pub const LOCK_FILE: &str = "lock.json";

/// Identity recorded in the lock marker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub owner: String,
    pub host: String,
    pub pid: u32,
    pub transaction: Uuid,
    pub acquired_at: DateTime<Utc>,
}

impl LockInfo {
    fn current(transaction: Uuid) -> Self {
        Self {
            owner: std::env::var("USER").unwrap_or_else(|_| "unknown".to_string()),
            host: current_host(),
            pid: std::process::id(),
            transaction,
            acquired_at: Utc::now(),
        }
    }
}

fn current_host() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// True when the pid provably no longer exists on this machine.
fn process_gone(pid: u32) -> bool {
    if cfg!(target_os = "linux") {
        !Path::new(&format!("/proc/{pid}")).exists()
    } else {
        // Without a portable liveness probe, assume the holder is alive.
        false
    }
}

/// Guard for the held repository lock. Releases the marker on drop.
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
    released: bool,
}

impl RepoLock {
    /// Acquire the repository lock, or fail immediately if held.
    ///
    /// A stale marker (same host, pid gone) or an unparseable marker left by
    /// a crashed writer is reclaimed once, with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockHeld`] when a live holder owns the marker.
    pub fn acquire(control_dir: &Path, transaction: Uuid) -> Result<Self> {
        fs::create_dir_all(control_dir)?;
        let path = control_dir.join(LOCK_FILE);

        let mut reclaimed = false;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let info = LockInfo::current(transaction);
                    file.write_all(serde_json::to_string_pretty(&info)?.as_bytes())?;
                    file.sync_all()?;
                    return Ok(Self {
                        path,
                        released: false,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    let holder: Option<LockInfo> = fs::read_to_string(&path)
                        .ok()
                        .and_then(|content| serde_json::from_str(&content).ok());

                    let stale = match &holder {
                        Some(info) => info.host == current_host() && process_gone(info.pid),
                        // A marker that never got its JSON written: the
                        // writer died between create and write.
                        None => true,
                    };

                    if stale && !reclaimed {
                        tracing::warn!(path = %path.display(), "reclaiming stale repository lock");
                        fs::remove_file(&path)?;
                        reclaimed = true;
                        continue;
                    }

                    return Err(match holder {
                        Some(info) => Error::LockHeld {
                            owner: info.owner,
                            host: info.host,
                            pid: info.pid,
                            since: info.acquired_at.to_rfc3339(),
                        },
                        None => Error::LockHeld {
                            owner: "unknown".to_string(),
                            host: "unknown".to_string(),
                            pid: 0,
                            since: "unknown".to_string(),
                        },
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Release the lock explicitly, surfacing removal failures.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        fs::remove_file(&self.path)?;
        Ok(())
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquire_writes_marker_and_release_removes_it() {
        let dir = tempdir().unwrap();
        let lock = RepoLock::acquire(dir.path(), Uuid::new_v4()).unwrap();

        let marker = dir.path().join(LOCK_FILE);
        assert!(marker.exists());
        let info: LockInfo =
            serde_json::from_str(&fs::read_to_string(&marker).unwrap()).unwrap();
        assert_eq!(info.pid, std::process::id());

        lock.release().unwrap();
        assert!(!marker.exists());
    }

    #[test]
    fn second_acquire_fails_while_held() {
        let dir = tempdir().unwrap();
        let _lock = RepoLock::acquire(dir.path(), Uuid::new_v4()).unwrap();

        let err = RepoLock::acquire(dir.path(), Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, Error::LockHeld { .. }));
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempdir().unwrap();
        {
            let _lock = RepoLock::acquire(dir.path(), Uuid::new_v4()).unwrap();
        }
        assert!(RepoLock::acquire(dir.path(), Uuid::new_v4()).is_ok());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn stale_same_host_marker_is_reclaimed() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join(LOCK_FILE);
        let dead = LockInfo {
            owner: "ghost".to_string(),
            host: current_host(),
            // Kernel pid_max caps real pids well below this.
            pid: u32::MAX - 1,
            transaction: Uuid::new_v4(),
            acquired_at: Utc::now(),
        };
        fs::write(&marker, serde_json::to_string(&dead).unwrap()).unwrap();

        let lock = RepoLock::acquire(dir.path(), Uuid::new_v4()).unwrap();
        lock.release().unwrap();
    }

    #[test]
    fn empty_marker_is_reclaimed() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(LOCK_FILE), "").unwrap();

        assert!(RepoLock::acquire(dir.path(), Uuid::new_v4()).is_ok());
    }

    #[test]
    fn foreign_host_marker_is_never_reclaimed() {
        let dir = tempdir().unwrap();
        let foreign = LockInfo {
            owner: "someone".to_string(),
            host: "another-machine".to_string(),
            pid: 1,
            transaction: Uuid::new_v4(),
            acquired_at: Utc::now(),
        };
        fs::write(
            dir.path().join(LOCK_FILE),
            serde_json::to_string(&foreign).unwrap(),
        )
        .unwrap();

        let err = RepoLock::acquire(dir.path(), Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, Error::LockHeld { .. }));
    }
}
