//! Checkpoint persistence
//!
//! The checkpoint is a single JSON record, replaced as a whole on every write.
//! Writes go through a temp file in the same directory, are fsynced and then
//! renamed over the old file, so readers never observe a partial checkpoint.
//!
//! The store does not lock; callers that read, fetch and then write hold a
//! [`RunLock`](super::lock::RunLock) for the whole sequence.

use super::checkpoint::IngestionCheckpoint;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Maximum accepted checkpoint size (1 MB)
pub const MAX_CHECKPOINT_FILE_SIZE: u64 = 1024 * 1024;

/// Checkpoint errors
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// No checkpoint has been written yet
    #[error("checkpoint not found: {0}")]
    NotFound(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Checkpoint exists but does not decode
    #[error("corrupt checkpoint {path}: {reason}")]
    Corrupt {
        /// Checkpoint path
        path: PathBuf,
        /// Decoder message
        reason: String,
    },

    /// Checkpoint file too large
    #[error("checkpoint file too large: {size} bytes exceeds maximum {max} bytes")]
    TooLarge {
        /// Actual file size in bytes
        size: u64,
        /// Maximum allowed size in bytes
        max: u64,
    },

    /// Lock error
    #[error("lock error: {0}")]
    Lock(String),
}

/// Reads and writes the checkpoint at a fixed path
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Store for the checkpoint at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Checkpoint file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a checkpoint has been written
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the checkpoint, failing with [`CheckpointError::NotFound`] if absent.
    pub fn read(&self) -> Result<IngestionCheckpoint, CheckpointError> {
        debug!(path = %self.path.display(), "Loading checkpoint");

        let metadata = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CheckpointError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(CheckpointError::Io(e.to_string())),
        };

        if metadata.len() > MAX_CHECKPOINT_FILE_SIZE {
            return Err(CheckpointError::TooLarge {
                size: metadata.len(),
                max: MAX_CHECKPOINT_FILE_SIZE,
            });
        }

        let contents =
            std::fs::read_to_string(&self.path).map_err(|e| CheckpointError::Io(e.to_string()))?;

        let checkpoint: IngestionCheckpoint = serde_json::from_str(&contents).map_err(|e| {
            warn!(error = %e, "Failed to deserialize checkpoint");
            CheckpointError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?;

        // Serde does not run the constructor, so re-check the bounds
        checkpoint.range().map_err(|e| CheckpointError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        info!(
            from_date = %checkpoint.from_date(),
            to_date = %checkpoint.to_date(),
            "Checkpoint loaded"
        );
        Ok(checkpoint)
    }

    /// Read the checkpoint, mapping "not found" to `None`.
    pub fn read_optional(&self) -> Result<Option<IngestionCheckpoint>, CheckpointError> {
        match self.read() {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(CheckpointError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Atomically replace the checkpoint.
    pub fn write(&self, checkpoint: &IngestionCheckpoint) -> Result<(), CheckpointError> {
        let parent_dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent_dir).map_err(|e| CheckpointError::Io(e.to_string()))?;

        let json = serde_json::to_string_pretty(checkpoint)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
            .map_err(|e| CheckpointError::Io(format!("Failed to create temp file: {e}")))?;
        temp_file
            .write_all(json.as_bytes())
            .map_err(|e| CheckpointError::Io(format!("Failed to write to temp file: {e}")))?;
        temp_file
            .flush()
            .map_err(|e| CheckpointError::Io(format!("Failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| CheckpointError::Io(format!("Failed to sync temp file: {e}")))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| CheckpointError::Io(format!("Failed to persist temp file: {e}")))?;

        // Fsync parent directory so the rename survives a crash
        if let Ok(dir) = std::fs::File::open(parent_dir) {
            let _ = dir.sync_all();
        }

        info!(
            path = %self.path.display(),
            from_date = %checkpoint.from_date(),
            to_date = %checkpoint.to_date(),
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Delete the checkpoint. Returns whether a file was removed.
    pub fn remove(&self) -> Result<bool, CheckpointError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CheckpointError::Io(e.to_string())),
        }
    }
}
