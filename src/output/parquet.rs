//! Parquet dataset store
//!
//! An artifact is a directory of Parquet part files (`part-00000.parquet`,
//! `part-00001.parquet`, ...). Each append writes one new part, so earlier
//! parts are never rewritten and the artifact only grows.
//!
//! The Arrow schema of each part is inferred from the JSON records being
//! appended (`arrow::json`), so parts written by different runs may carry
//! different column sets when the source adds fields.

use super::{ColumnarStore, OutputError, OutputResult};
use crate::Record;
use arrow::datatypes::{Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::json::reader::infer_json_schema_from_iterator;
use arrow::json::ReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use serde_json::Value;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Prefix of part file names
pub const PART_FILE_PREFIX: &str = "part-";

/// Extension of part files
pub const PART_FILE_EXTENSION: &str = "parquet";

/// Default rows per Arrow batch
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// [`ColumnarStore`] backed by a directory of Parquet files
#[derive(Debug, Clone)]
pub struct ParquetStore {
    batch_size: usize,
    compression: Compression,
}

impl ParquetStore {
    /// Create a store with default batch size and Snappy compression
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            compression: Compression::SNAPPY,
        }
    }

    /// Set rows per Arrow batch
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Part files of the dataset at `path`, sorted by name
    pub fn part_files(path: &Path) -> OutputResult<Vec<PathBuf>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(path)
            .map_err(|e| OutputError::IoError(format!("{}: {e}", path.display())))?;

        let mut parts = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| OutputError::IoError(e.to_string()))?;
            let candidate = entry.path();
            if part_index(&candidate).is_some() {
                parts.push(candidate);
            }
        }
        parts.sort();
        Ok(parts)
    }

    fn next_part_path(path: &Path) -> OutputResult<PathBuf> {
        let next = Self::part_files(path)?
            .iter()
            .filter_map(|part| part_index(part))
            .max()
            .map_or(0, |last| last + 1);
        Ok(path.join(format!("{PART_FILE_PREFIX}{next:05}.{PART_FILE_EXTENSION}")))
    }

    fn infer_schema(records: &[Record]) -> OutputResult<SchemaRef> {
        let values = records
            .iter()
            .map(|record| Ok::<_, ArrowError>(Value::Object(record.clone())));
        let schema: Schema = infer_json_schema_from_iterator(values)
            .map_err(|e| OutputError::Schema(format!("cannot infer schema: {e}")))?;

        if schema.fields().is_empty() {
            return Err(OutputError::Schema("records have no fields".to_string()));
        }
        Ok(Arc::new(schema))
    }
}

impl Default for ParquetStore {
    fn default() -> Self {
        Self::new()
    }
}

fn part_index(path: &Path) -> Option<u32> {
    if path.extension().and_then(|ext| ext.to_str()) != Some(PART_FILE_EXTENSION) {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix(PART_FILE_PREFIX)?
        .parse()
        .ok()
}

impl ColumnarStore for ParquetStore {
    fn append_records(&self, path: &Path, records: &[Record]) -> OutputResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let schema = Self::infer_schema(records)?;
        let mut decoder = ReaderBuilder::new(schema.clone())
            .with_batch_size(self.batch_size)
            .with_coerce_primitive(true)
            .build_decoder()
            .map_err(|e| OutputError::Schema(e.to_string()))?;

        std::fs::create_dir_all(path)
            .map_err(|e| OutputError::IoError(format!("{}: {e}", path.display())))?;
        let part_path = Self::next_part_path(path)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(path)
            .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {e}")))?;

        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .build();
        let mut rows_written = 0u64;
        {
            // Fails only when the inferred schema has no Parquet mapping
            let mut writer = ArrowWriter::try_new(temp_file.as_file_mut(), schema, Some(props))
                .map_err(|e| OutputError::Schema(e.to_string()))?;

            for chunk in records.chunks(self.batch_size) {
                decoder
                    .serialize(chunk)
                    .map_err(|e| OutputError::Schema(e.to_string()))?;
                let Some(batch) = decoder
                    .flush()
                    .map_err(|e| OutputError::Schema(e.to_string()))?
                else {
                    continue;
                };
                writer
                    .write(&batch)
                    .map_err(|e| OutputError::ParquetError(e.to_string()))?;
                rows_written += batch.num_rows() as u64;
            }

            writer
                .close()
                .map_err(|e| OutputError::ParquetError(e.to_string()))?;
        }

        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync temp file: {e}")))?;
        temp_file.persist(&part_path).map_err(|e| {
            OutputError::IoError(format!("Failed to persist {}: {e}", part_path.display()))
        })?;

        debug!(
            part = %part_path.display(),
            rows = rows_written,
            "Appended Parquet part"
        );

        Ok(rows_written)
    }

    fn count(&self, path: &Path) -> OutputResult<u64> {
        let mut total = 0u64;
        for part in Self::part_files(path)? {
            let file = File::open(&part)
                .map_err(|e| OutputError::IoError(format!("{}: {e}", part.display())))?;
            let reader = SerializedFileReader::new(file)
                .map_err(|e| OutputError::ParquetError(format!("{}: {e}", part.display())))?;
            let rows = reader.metadata().file_metadata().num_rows();
            total += u64::try_from(rows).unwrap_or(0);
        }
        Ok(total)
    }
}
