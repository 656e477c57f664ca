//! Ingestion checkpoint record

use crate::{DateRange, DateRangeError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How much has been ingested
///
/// Serialized as:
///
/// ```json
/// {"from_date": "2011-12-01", "to_date": "2022-05-17", "data_file_path": "..."}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionCheckpoint {
    from_date: NaiveDate,
    to_date: NaiveDate,
    data_file_path: PathBuf,
}

impl IngestionCheckpoint {
    /// Create a checkpoint, rejecting inverted bounds
    pub fn new(
        from_date: NaiveDate,
        to_date: NaiveDate,
        data_file_path: impl Into<PathBuf>,
    ) -> Result<Self, DateRangeError> {
        DateRange::new(from_date, to_date)?;
        Ok(Self {
            from_date,
            to_date,
            data_file_path: data_file_path.into(),
        })
    }

    /// Requested lower bound of the ingestion history
    pub fn from_date(&self) -> NaiveDate {
        self.from_date
    }

    /// Date up to which data has been ingested; the next run resumes here
    pub fn to_date(&self) -> NaiveDate {
        self.to_date
    }

    /// Merged artifact location
    pub fn data_file_path(&self) -> &Path {
        &self.data_file_path
    }

    /// Covered range
    pub fn range(&self) -> Result<DateRange, DateRangeError> {
        DateRange::new(self.from_date, self.to_date)
    }
}
