//! Merge of per-window files into the long-lived artifact
//!
//! Window files are visited in lexicographic order of their names. Since names
//! embed the window bounds, this is also chronological order, and a fixed
//! directory listing always produces the same append sequence.

use super::json::read_window_file;
use super::path::is_window_file;
use super::{ColumnarStore, OutputError};
use crate::metrics::{record_merge_file_skipped, record_merge_rows};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fatal merge errors
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// Window directory could not be listed
    #[error("cannot list window files in {path}: {reason}")]
    ListDir {
        /// Directory being merged
        path: PathBuf,
        /// Underlying error
        reason: String,
    },

    /// Columnar store failed for a reason other than unreadable input
    #[error("failed to append {file} to {artifact}: {source}")]
    Store {
        /// Window file being appended
        file: PathBuf,
        /// Artifact path
        artifact: PathBuf,
        /// Store error
        #[source]
        source: OutputError,
    },
}

/// What a merge did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Window files appended
    pub files_merged: usize,
    /// Window files that parsed but held no records
    pub files_empty: usize,
    /// Window files skipped because they could not be read
    pub files_skipped: Vec<PathBuf>,
    /// Rows appended to the artifact
    pub rows_appended: u64,
}

/// Appends window files to a columnar artifact
pub struct ArtifactMerger {
    store: Arc<dyn ColumnarStore>,
}

impl ArtifactMerger {
    /// Create a merger writing through `store`
    pub fn new(store: Arc<dyn ColumnarStore>) -> Self {
        Self { store }
    }

    /// Append every readable, non-empty window file in `window_dir` to `artifact`.
    ///
    /// A missing `window_dir` merges nothing. Files that fail to parse, or whose
    /// records cannot be mapped to a columnar schema, are skipped with a warning.
    /// Any other store failure aborts the merge.
    pub fn merge(&self, window_dir: &Path, artifact: &Path) -> Result<MergeReport, MergeError> {
        let files = list_window_files(window_dir)?;
        let mut report = MergeReport::default();

        info!(
            window_dir = %window_dir.display(),
            artifact = %artifact.display(),
            files = files.len(),
            "Merging window files"
        );

        for file in files {
            let records = match read_window_file(&file) {
                Ok(records) => records,
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "Skipping unreadable window file");
                    record_merge_file_skipped();
                    report.files_skipped.push(file);
                    continue;
                }
            };

            if records.is_empty() {
                debug!(file = %file.display(), "Window file is empty");
                report.files_empty += 1;
                continue;
            }

            match self.store.append_records(artifact, &records) {
                Ok(rows) => {
                    debug!(file = %file.display(), rows = rows, "Appended window file");
                    record_merge_rows(rows);
                    report.files_merged += 1;
                    report.rows_appended += rows;
                }
                Err(OutputError::Schema(reason)) => {
                    warn!(file = %file.display(), error = %reason, "Skipping window file with unusable schema");
                    record_merge_file_skipped();
                    report.files_skipped.push(file);
                }
                Err(source) => {
                    return Err(MergeError::Store {
                        file,
                        artifact: artifact.to_path_buf(),
                        source,
                    });
                }
            }
        }

        info!(
            merged = report.files_merged,
            empty = report.files_empty,
            skipped = report.files_skipped.len(),
            rows = report.rows_appended,
            "Merge finished"
        );

        Ok(report)
    }
}

/// Window files in `dir`, sorted by file name
pub fn list_window_files(dir: &Path) -> Result<Vec<PathBuf>, MergeError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let list_err = |e: std::io::Error| MergeError::ListDir {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(list_err)? {
        let path = entry.map_err(list_err)?.path();
        if path.is_file() && is_window_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
