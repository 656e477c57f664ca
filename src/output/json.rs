//! Per-window JSON files
//!
//! A window file is a JSON array of objects, each the payload of one source
//! record. Files are written atomically: a reader either sees the complete
//! file or nothing.

use super::{OutputError, OutputResult};
use crate::Record;
use serde_json::Value;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Maximum window file size accepted by [`read_window_file`] (1 GiB)
pub const MAX_WINDOW_FILE_SIZE: u64 = 1024 * 1024 * 1024;

/// Decode a response body and keep the payload of each record.
///
/// The body must be a JSON array. Elements that are not objects, or that lack
/// an object-valued `payload_field`, are dropped. An empty array is valid.
pub fn extract_payloads(body: &[u8], payload_field: &str) -> OutputResult<Vec<Record>> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| OutputError::InvalidPayload(format!("response is not JSON: {e}")))?;

    let Value::Array(items) = value else {
        return Err(OutputError::InvalidPayload(format!(
            "expected a JSON array of records, got {}",
            json_kind(&value)
        )));
    };

    let records = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(mut record) => match record.remove(payload_field) {
                Some(Value::Object(payload)) => Some(payload),
                _ => None,
            },
            _ => None,
        })
        .collect();

    Ok(records)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Write `records` to `path` atomically (temp file, fsync, rename).
pub fn write_window_file(path: &Path, records: &[Record]) -> OutputResult<()> {
    let parent_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
        .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {e}")))?;

    {
        let mut writer = BufWriter::new(temp_file.as_file_mut());
        serde_json::to_writer(&mut writer, records)
            .map_err(|e| OutputError::SerializationError(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| OutputError::IoError(format!("Failed to flush temp file: {e}")))?;
    }

    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| OutputError::IoError(format!("Failed to sync temp file: {e}")))?;
    temp_file
        .persist(path)
        .map_err(|e| OutputError::IoError(format!("Failed to persist {}: {e}", path.display())))?;

    Ok(())
}

/// Read a window file back into records.
pub fn read_window_file(path: &Path) -> OutputResult<Vec<Record>> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| OutputError::IoError(format!("{}: {e}", path.display())))?;
    if metadata.len() > MAX_WINDOW_FILE_SIZE {
        return Err(OutputError::SerializationError(format!(
            "{} is {} bytes, above the {} byte limit",
            path.display(),
            metadata.len(),
            MAX_WINDOW_FILE_SIZE
        )));
    }

    let contents = std::fs::read(path)
        .map_err(|e| OutputError::IoError(format!("{}: {e}", path.display())))?;
    serde_json::from_slice(&contents)
        .map_err(|e| OutputError::SerializationError(format!("{}: {e}", path.display())))
}
