//! Workspace exclusivity lock
//!
//! The lock file is the sole cross-process mutual-exclusion primitive: only
//! one process may hold `is_primary` for a workspace at a time. Acquisition
//! is atomic (create-if-absent) and writes owner PID, host, and acquisition
//! time as JSON. A lock whose owner process is no longer alive on this host
//! is stale and gets reclaimed, so a crash never deadlocks the workspace.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{LooprunError, Result};

/// Owner metadata stored inside the lock file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// PID of the owning process
    pub pid: u32,
    /// Hostname of the owning process
    pub host: String,
    /// RFC 3339 acquisition timestamp
    pub acquired_at: String,
}

impl LockInfo {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            host: local_hostname(),
            acquired_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Exclusive lock on a workspace, released at most once
#[derive(Debug)]
pub struct WorkspaceLock {
    path: PathBuf,
    held: bool,
}

impl WorkspaceLock {
    /// Acquire the lock at `path`, reclaiming it if the recorded owner is a
    /// dead process on this host. Fails with `LockContention` otherwise.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Two attempts: the second runs only after a stale lock was removed.
        for attempt in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    let info = LockInfo::current();
                    file.write_all(serde_json::to_string(&info)?.as_bytes())?;
                    file.sync_all()?;
                    info!("acquired workspace lock at {} (pid {})", path.display(), info.pid);
                    return Ok(Self {
                        path: path.to_path_buf(),
                        held: true,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    let owner = Self::read_info(path)?;
                    match owner {
                        Some(info) if attempt == 0 && is_stale(&info) => {
                            warn!(
                                "reclaiming stale lock at {} (owner pid {} is gone)",
                                path.display(),
                                info.pid
                            );
                            // Another contender may remove it first; ignore.
                            let _ = fs::remove_file(path);
                        }
                        Some(info) => {
                            return Err(LooprunError::LockContention(format!(
                                "workspace locked by pid {} on {} since {}",
                                info.pid, info.host, info.acquired_at
                            )));
                        }
                        None => {
                            return Err(LooprunError::LockContention(format!(
                                "workspace lock at {} exists but is unreadable",
                                path.display()
                            )));
                        }
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(LooprunError::LockContention(format!(
            "workspace lock at {} could not be acquired",
            path.display()
        )))
    }

    /// Read owner metadata without acquiring. None if the file is missing
    /// or malformed.
    pub fn read_info(path: &Path) -> Result<Option<LockInfo>> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(serde_json::from_str(&contents).ok()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether this handle still holds the lock
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Release the lock. Releasing an already-released lock is a no-op.
    pub fn release(&mut self) -> Result<()> {
        if !self.held {
            return Ok(());
        }
        self.held = false;
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        info!("released workspace lock at {}", self.path.display());
        Ok(())
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        if self.held
            && let Err(e) = self.release()
        {
            warn!("failed to release workspace lock on drop: {}", e);
        }
    }
}

/// A lock is stale when its owner is on this host and no longer alive.
/// Liveness cannot be probed across hosts, so foreign locks are honored.
fn is_stale(info: &LockInfo) -> bool {
    info.host == local_hostname() && !process_alive(info.pid)
}

#[cfg(unix)]
fn local_hostname() -> String {
    nix::unistd::gethostname()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(not(unix))]
fn local_hostname() -> String {
    std::env::var("COMPUTERNAME").unwrap_or_else(|_| "unknown".to_string())
}

/// Check if a process with the given PID is running
#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    // Signal 0 probes existence without affecting the process
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    // Cannot probe; assume alive and honor the lock
    true
}
