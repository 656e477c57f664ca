//! Window fetching and run coordination
//!
//! A run goes through these steps:
//!
//! 1. **Resolve**: read the checkpoint and derive the effective date range
//! 2. **Plan**: split the range into windows with [`crate::planner::plan`]
//! 3. **Fetch**: run [`WindowFetcher`] over every window, a bounded number at a time
//! 4. **Merge**: append all window files to the artifact with [`crate::output::ArtifactMerger`]
//! 5. **Checkpoint**: persist the new checkpoint, only after the merge succeeded
//!
//! # Quick Start
//!
//! ```no_run
//! use complaint_ingest::config::{IngestionConfig, PipelineConfig, SystemClock};
//! use complaint_ingest::downloader::IngestionCoordinator;
//! use complaint_ingest::fetcher::HttpSourceFetcher;
//! use complaint_ingest::output::ParquetStore;
//! use complaint_ingest::parse_date;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = IngestionConfig::new(&PipelineConfig::default(), &SystemClock)
//!     .with_from_date(parse_date("2022-01-01")?)
//!     .with_n_retry(3);
//!
//! let artifact = IngestionCoordinator::new(
//!     config,
//!     Arc::new(HttpSourceFetcher::shared()),
//!     Arc::new(ParquetStore::new()),
//! )
//! .run()
//! .await?;
//!
//! println!("{} windows quarantined", artifact.summary.quarantined.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! A window that exhausts its retries is not an error: it is reported as
//! [`FetchOutcome::QuarantinedFailure`] and the run carries on. Only local I/O
//! failures, merge failures and checkpoint failures end a run with
//! [`IngestionError`].

use crate::output::MergeError;
use crate::resume::CheckpointError;
use std::path::PathBuf;

pub mod config;
pub mod coordinator;
pub mod window;
pub mod window_fetcher;

pub use coordinator::{IngestionArtifact, IngestionCoordinator, RunSummary};
pub use window::{FetchOutcome, FetchWindow};
pub use window_fetcher::WindowFetcher;

/// Fatal ingestion errors
#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    /// Configuration violates an invariant
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Local filesystem failure outside merge and checkpoint
    #[error("IO error on {path}: {reason}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        reason: String,
    },

    /// Quarantine file could not be written
    #[error("cannot quarantine response to {path}: {reason}")]
    Quarantine {
        /// Quarantine file path
        path: PathBuf,
        /// Underlying error
        reason: String,
    },

    /// Merge failed; the checkpoint was not advanced
    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),

    /// Existing checkpoint could not be read
    #[error("cannot read checkpoint: {0}")]
    CheckpointRead(#[source] CheckpointError),

    /// Data was merged but the checkpoint could not be persisted
    #[error("data merged but checkpoint not saved: {0}")]
    CheckpointWrite(#[source] CheckpointError),

    /// Another run holds the checkpoint lock
    #[error("cannot lock checkpoint: {0}")]
    Lock(#[source] CheckpointError),

    /// Download directory of this run already exists (same run timestamp)
    #[error("run directory {0} already exists")]
    RunDirectoryExists(PathBuf),

    /// Blocking task panicked or was aborted
    #[error("background task failed: {0}")]
    Task(String),

    /// Shutdown was requested
    #[error("ingestion cancelled")]
    Cancelled,
}
