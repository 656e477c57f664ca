//! Integration tests for merging window files into a Parquet artifact

use complaint_ingest::output::json::write_window_file;
use complaint_ingest::output::path::window_file_path;
use complaint_ingest::output::{ArtifactMerger, ColumnarStore, ParquetStore};
use complaint_ingest::{parse_date, DateRange, Record};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn window(from: &str, to: &str) -> DateRange {
    DateRange::new(parse_date(from).unwrap(), parse_date(to).unwrap()).unwrap()
}

fn records(ids: &[i64]) -> Vec<Record> {
    ids.iter()
        .map(|id| {
            json!({"complaint_id": id, "product": "Mortgage", "state": "CA"})
                .as_object()
                .cloned()
                .unwrap()
        })
        .collect()
}

fn write_window(dir: &Path, range: DateRange, ids: &[i64]) {
    let path = window_file_path(dir, "finance_complaint", &range);
    write_window_file(&path, &records(ids)).unwrap();
}

#[test]
fn test_merge_appends_all_windows() {
    let temp_dir = TempDir::new().unwrap();
    let window_dir = temp_dir.path().join("downloaded_files");
    std::fs::create_dir_all(&window_dir).unwrap();
    let artifact = temp_dir.path().join("feature_store").join("finance_complaint");

    write_window(&window_dir, window("2020-01-01", "2020-02-01"), &[1, 2, 3]);
    write_window(&window_dir, window("2020-02-01", "2020-03-01"), &[4, 5]);
    write_window(&window_dir, window("2020-03-01", "2020-03-10"), &[]);

    let store = Arc::new(ParquetStore::new());
    let report = ArtifactMerger::new(store.clone())
        .merge(&window_dir, &artifact)
        .unwrap();

    assert_eq!(report.files_merged, 2);
    assert_eq!(report.files_empty, 1);
    assert!(report.files_skipped.is_empty());
    assert_eq!(report.rows_appended, 5);
    assert_eq!(store.count(&artifact).unwrap(), 5);
    assert_eq!(ParquetStore::part_files(&artifact).unwrap().len(), 2);
}

#[test]
fn test_second_merge_grows_artifact_without_rewriting() {
    let temp_dir = TempDir::new().unwrap();
    let artifact = temp_dir.path().join("finance_complaint");
    let store = Arc::new(ParquetStore::new());
    let merger = ArtifactMerger::new(store.clone());

    let first_run = temp_dir.path().join("run1");
    std::fs::create_dir_all(&first_run).unwrap();
    write_window(&first_run, window("2020-01-01", "2020-02-01"), &[1, 2]);
    merger.merge(&first_run, &artifact).unwrap();

    let first_part = ParquetStore::part_files(&artifact).unwrap()[0].clone();
    let first_bytes = std::fs::read(&first_part).unwrap();

    let second_run = temp_dir.path().join("run2");
    std::fs::create_dir_all(&second_run).unwrap();
    write_window(&second_run, window("2020-02-01", "2020-03-01"), &[3, 4, 5]);
    merger.merge(&second_run, &artifact).unwrap();

    assert_eq!(store.count(&artifact).unwrap(), 5);
    assert_eq!(std::fs::read(&first_part).unwrap(), first_bytes);
}

#[test]
fn test_merging_same_directory_twice_appends_again() {
    let temp_dir = TempDir::new().unwrap();
    let window_dir = temp_dir.path().join("downloaded_files");
    std::fs::create_dir_all(&window_dir).unwrap();
    let artifact = temp_dir.path().join("finance_complaint");
    write_window(&window_dir, window("2020-01-01", "2020-02-01"), &[1, 2]);

    let store = Arc::new(ParquetStore::new());
    let merger = ArtifactMerger::new(store.clone());

    merger.merge(&window_dir, &artifact).unwrap();
    assert_eq!(store.count(&artifact).unwrap(), 2);

    // Append-only: the artifact is never reset between merges
    merger.merge(&window_dir, &artifact).unwrap();
    assert_eq!(store.count(&artifact).unwrap(), 4);
}

#[test]
fn test_truncated_window_file_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let window_dir = temp_dir.path().join("downloaded_files");
    std::fs::create_dir_all(&window_dir).unwrap();
    let artifact = temp_dir.path().join("finance_complaint");

    write_window(&window_dir, window("2020-01-01", "2020-02-01"), &[1]);
    let broken = window_file_path(
        &window_dir,
        "finance_complaint",
        &window("2020-02-01", "2020-03-01"),
    );
    std::fs::write(&broken, r#"[{"complaint_id": 2"#).unwrap();

    let store = Arc::new(ParquetStore::new());
    let report = ArtifactMerger::new(store.clone())
        .merge(&window_dir, &artifact)
        .unwrap();

    assert_eq!(report.files_merged, 1);
    assert_eq!(report.files_skipped, vec![broken]);
    assert_eq!(store.count(&artifact).unwrap(), 1);
}
