//! Fetch windows and their outcomes

use crate::DateRange;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One window to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchWindow {
    /// Date bounds, upper bound exclusive
    pub range: DateRange,
    /// Where the validated records file goes
    pub target_path: PathBuf,
    /// Attempts left, including the next one
    pub retries_remaining: u32,
}

impl FetchWindow {
    /// Create a window
    pub fn new(range: DateRange, target_path: impl Into<PathBuf>, retries_remaining: u32) -> Self {
        Self {
            range,
            target_path: target_path.into(),
            retries_remaining,
        }
    }
}

/// Terminal result of fetching one window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// Records were validated and written
    Success {
        /// Window bounds
        window: DateRange,
        /// Written window file
        path: PathBuf,
        /// Records in the file
        records: u64,
        /// Attempts used
        attempts: u32,
    },
    /// Every attempt failed; the last raw response was quarantined
    QuarantinedFailure {
        /// Window bounds
        original_window: DateRange,
        /// Quarantine file
        raw_response_path: PathBuf,
        /// Attempts used
        attempts: u32,
        /// Reason the last attempt failed
        last_error: String,
    },
}

impl FetchOutcome {
    /// Window this outcome belongs to
    pub fn window(&self) -> DateRange {
        match self {
            FetchOutcome::Success { window, .. } => *window,
            FetchOutcome::QuarantinedFailure {
                original_window, ..
            } => *original_window,
        }
    }

    /// Whether the window was fetched successfully
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }

    /// Path of the file written for this window
    pub fn path(&self) -> &Path {
        match self {
            FetchOutcome::Success { path, .. } => path,
            FetchOutcome::QuarantinedFailure {
                raw_response_path, ..
            } => raw_response_path,
        }
    }

    /// Records written (zero when quarantined)
    pub fn records(&self) -> u64 {
        match self {
            FetchOutcome::Success { records, .. } => *records,
            FetchOutcome::QuarantinedFailure { .. } => 0,
        }
    }

    /// Attempts used
    pub fn attempts(&self) -> u32 {
        match self {
            FetchOutcome::Success { attempts, .. } => *attempts,
            FetchOutcome::QuarantinedFailure { attempts, .. } => *attempts,
        }
    }
}
