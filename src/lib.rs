//! # Complaint Ingest
//!
//! Incremental data-ingestion stage for a batch training pipeline. Given a
//! source API and a date range, it fetches time-windowed JSON records, merges
//! them into a columnar (Parquet) artifact and advances a durable checkpoint so
//! the next run resumes where this one stopped instead of re-fetching.
//!
//! ## Quick Start
//!
//! ```no_run
//! use complaint_ingest::config::{IngestionConfig, PipelineConfig, SystemClock};
//! use complaint_ingest::downloader::IngestionCoordinator;
//! use complaint_ingest::fetcher::http::HttpSourceFetcher;
//! use complaint_ingest::output::parquet::ParquetStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = PipelineConfig::default();
//! let config = IngestionConfig::new(&pipeline, &SystemClock);
//!
//! let coordinator = IngestionCoordinator::new(
//!     config,
//!     Arc::new(HttpSourceFetcher::shared()),
//!     Arc::new(ParquetStore::new()),
//! );
//! let artifact = coordinator.run().await?;
//! println!("merged into {}", artifact.artifact_path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`planner`] - splits a date range into contiguous fetch windows
//! - [`fetcher`] - the `fetch(url)` capability and its HTTP implementation
//! - [`downloader`] - per-window retry/quarantine and the run coordinator
//! - [`output`] - per-window JSON files, the columnar store and the merger
//! - [`resume`] - the persisted checkpoint and the run lock
//! - [`config`] - pipeline/ingestion configuration and the clock capability

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// CLI command implementations
pub mod cli;

/// Pipeline and ingestion configuration
pub mod config;

/// Window fetching and run coordination
pub mod downloader;

/// Source fetch capability
pub mod fetcher;

/// Observability metrics
pub mod metrics;

/// Window files, columnar store and merge
pub mod output;

/// Date range partitioning
pub mod planner;

/// Persisted checkpoint and run locking
pub mod resume;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

pub use config::{IngestionConfig, PipelineConfig};
pub use downloader::{IngestionArtifact, IngestionCoordinator, IngestionError};
pub use planner::{plan, Granularity};

/// Date format used for checkpoints, URLs and file names.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single JSON object record, as stored in per-window files.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Parse an ISO `YYYY-MM-DD` date.
pub fn parse_date(input: &str) -> Result<NaiveDate, DateRangeError> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|e| DateRangeError::InvalidDate {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

/// Calendar date range `[from_date, to_date]` with `from_date <= to_date`.
///
/// When used as a fetch window the upper bound is exclusive: the next window
/// starts exactly where this one ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateRange {
    from_date: NaiveDate,
    to_date: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting inverted bounds.
    pub fn new(from_date: NaiveDate, to_date: NaiveDate) -> Result<Self, DateRangeError> {
        if from_date > to_date {
            return Err(DateRangeError::Inverted { from_date, to_date });
        }
        Ok(Self { from_date, to_date })
    }

    /// Lower bound
    pub fn from_date(&self) -> NaiveDate {
        self.from_date
    }

    /// Upper bound
    pub fn to_date(&self) -> NaiveDate {
        self.to_date
    }

    /// Number of days between the bounds.
    pub fn span_days(&self) -> i64 {
        (self.to_date - self.from_date).num_days()
    }

    /// True when both bounds are the same day (nothing to fetch).
    pub fn is_empty(&self) -> bool {
        self.from_date == self.to_date
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.from_date.format(DATE_FORMAT),
            self.to_date.format(DATE_FORMAT)
        )
    }
}

/// Errors building date ranges
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateRangeError {
    /// `from_date` is after `to_date`
    #[error("from_date {from_date} is after to_date {to_date}")]
    Inverted {
        /// Requested lower bound
        from_date: NaiveDate,
        /// Requested upper bound
        to_date: NaiveDate,
    },

    /// Input is not a `YYYY-MM-DD` date
    #[error("invalid date '{input}': {reason}")]
    InvalidDate {
        /// Raw input
        input: String,
        /// Parser message
        reason: String,
    },
}
