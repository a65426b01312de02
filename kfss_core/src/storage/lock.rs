//! Data directory lock.
//!
//! Uses both:
//! 1. OS-level file locking (via fs2) for process safety
//! 2. a `.lock` file with metadata so the error can say who holds it
//!
//! The lock file is removed when the guard drops.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult};

const LOCK_FILE_NAME: &str = ".kfss.lock";

/// Locks older than this are treated as abandoned
const STALE_AFTER_HOURS: i64 = 24;

/// Metadata written into the lock file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub user_id: String,
    pub machine: String,
    pub pid: u32,
    pub locked_at: DateTime<Utc>,
}

impl LockInfo {
    pub fn new(user_id: impl Into<String>) -> Self {
        LockInfo {
            user_id: user_id.into(),
            machine: hostname().unwrap_or_else(|| "unknown".to_string()),
            pid: std::process::id(),
            locked_at: Utc::now(),
        }
    }

    /// The holding process is gone, or the lock is simply too old
    fn is_stale(&self) -> bool {
        if hostname().as_deref() == Some(self.machine.as_str()) && !process_alive(self.pid) {
            return true;
        }
        (Utc::now() - self.locked_at).num_hours() > STALE_AFTER_HOURS
    }
}

fn hostname() -> Option<String> {
    #[cfg(windows)]
    {
        std::env::var("COMPUTERNAME").ok()
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOSTNAME")
            .ok()
            .or_else(|| std::env::var("HOST").ok())
    }
}

fn process_alive(pid: u32) -> bool {
    #[cfg(target_os = "linux")]
    {
        Path::new(&format!("/proc/{}", pid)).exists()
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = pid;
        true
    }
}

/// Exclusive lock on a data directory, released on drop.
#[derive(Debug)]
pub struct DataDirLock {
    lock_path: PathBuf,
    _lock_file: File,
    pub info: LockInfo,
}

impl DataDirLock {
    /// Acquire the lock for `dir`.
    ///
    /// # Returns
    ///
    /// * `Ok(DataDirLock)` - Lock acquired
    /// * `Err(CalcError::FileLocked)` - Another live process holds it
    pub fn acquire(dir: &Path, user_id: impl Into<String>) -> CalcResult<Self> {
        let lock_path = dir.join(LOCK_FILE_NAME);
        let info = LockInfo::new(user_id);

        if let Some(existing) = read_lock_info(&lock_path) {
            if !existing.is_stale() {
                return Err(CalcError::file_locked(
                    dir.display().to_string(),
                    format!("{} ({}, pid {})", existing.user_id, existing.machine, existing.pid),
                    existing.locked_at.to_rfc3339(),
                ));
            }
        }

        let mut lock_file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| CalcError::file_error("create lock", lock_path.display().to_string(), e.to_string()))?;

        lock_file.try_lock_exclusive().map_err(|_| {
            CalcError::file_locked(dir.display().to_string(), "another process", "unknown")
        })?;

        // Only the holder may clear the previous metadata
        let lock_json = serde_json::to_string_pretty(&info)?;
        lock_file
            .set_len(0)
            .and_then(|_| lock_file.write_all(lock_json.as_bytes()))
            .and_then(|_| lock_file.sync_all())
            .map_err(|e| CalcError::file_error("write lock", lock_path.display().to_string(), e.to_string()))?;

        Ok(DataDirLock {
            lock_path,
            _lock_file: lock_file,
            info,
        })
    }

    /// Current holder of the lock for `dir`, if any
    pub fn holder(dir: &Path) -> Option<LockInfo> {
        read_lock_info(&dir.join(LOCK_FILE_NAME)).filter(|info| !info.is_stale())
    }
}

impl Drop for DataDirLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

fn read_lock_info(lock_path: &Path) -> Option<LockInfo> {
    let contents = fs::read_to_string(lock_path).ok()?;
    serde_json::from_str(&contents).ok()
}
