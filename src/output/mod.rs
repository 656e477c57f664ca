//! Window files, columnar storage and merge

use crate::Record;
use std::path::Path;

pub mod json;
pub mod merge;
pub mod parquet;
pub mod path;

pub use merge::{ArtifactMerger, MergeError, MergeReport};
pub use parquet::ParquetStore;

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Parquet write or read error
    #[error("parquet error: {0}")]
    ParquetError(String),

    /// Records cannot be mapped to a columnar schema
    #[error("schema error: {0}")]
    Schema(String),

    /// JSON (de)serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Response body is not a sequence of records
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Columnar storage capability used by the merger
///
/// Calls are blocking; async callers run them on a blocking thread.
pub trait ColumnarStore: Send + Sync {
    /// Append `records` to the artifact at `path`, creating it if absent.
    ///
    /// Returns the number of rows written. Earlier contents are never rewritten.
    fn append_records(&self, path: &Path, records: &[Record]) -> OutputResult<u64>;

    /// Total rows stored at `path` (zero when absent)
    fn count(&self, path: &Path) -> OutputResult<u64>;
}
