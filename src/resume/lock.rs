//! Advisory run lock
//!
//! One ingestion run at a time may hold the lock for a checkpoint. The lock
//! lives in a sibling `<checkpoint>.lock` file so the checkpoint itself can be
//! atomically replaced while the lock is held.

use super::store::CheckpointError;
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Lock file path for a checkpoint path
pub fn lock_path_for(checkpoint_path: &Path) -> PathBuf {
    let mut name = checkpoint_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    checkpoint_path.with_file_name(name)
}

/// Lock file handle
pub struct RunLock {
    path: PathBuf,
    lock: RwLock<File>,
}

/// Held lock; released on drop
pub type RunLockGuard<'a> = RwLockWriteGuard<'a, File>;

impl RunLock {
    /// Open (creating if needed) the lock file for `checkpoint_path`
    pub fn open(checkpoint_path: &Path) -> Result<Self, CheckpointError> {
        let path = lock_path_for(checkpoint_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CheckpointError::Io(e.to_string()))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| CheckpointError::Lock(format!("Failed to open lock file: {e}")))?;

        Ok(Self {
            path,
            lock: RwLock::new(file),
        })
    }

    /// Try to take the exclusive lock without blocking
    pub fn try_acquire(&mut self) -> Result<RunLockGuard<'_>, CheckpointError> {
        let path = self.path.display().to_string();
        self.lock.try_write().map_err(|e| {
            CheckpointError::Lock(format!("{path} is held by another run: {e}"))
        })
    }

    /// Lock file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}
