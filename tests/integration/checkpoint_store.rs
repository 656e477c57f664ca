//! Integration tests for the persisted checkpoint and run lock

use complaint_ingest::parse_date;
use complaint_ingest::resume::{CheckpointError, CheckpointStore, IngestionCheckpoint, RunLock};
use tempfile::TempDir;

fn checkpoint(to: &str) -> IngestionCheckpoint {
    IngestionCheckpoint::new(
        parse_date("2011-12-01").unwrap(),
        parse_date(to).unwrap(),
        "finance_artifact/data_ingestion/feature_store/finance_complaint",
    )
    .unwrap()
}

#[test]
fn test_checkpoint_survives_a_new_store_instance() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data_ingestion").join("meta_info.json");

    CheckpointStore::new(&path).write(&checkpoint("2022-05-17")).unwrap();

    let reopened = CheckpointStore::new(&path);
    assert!(reopened.exists());
    assert_eq!(reopened.read().unwrap(), checkpoint("2022-05-17"));
}

#[test]
fn test_checkpoint_file_uses_iso_dates() {
    let temp_dir = TempDir::new().unwrap();
    let store = CheckpointStore::new(temp_dir.path().join("meta_info.json"));
    store.write(&checkpoint("2022-05-17")).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
    assert_eq!(value["from_date"], "2011-12-01");
    assert_eq!(value["to_date"], "2022-05-17");
    assert_eq!(
        value["data_file_path"],
        "finance_artifact/data_ingestion/feature_store/finance_complaint"
    );
}

#[test]
fn test_overwrite_leaves_no_temp_files() {
    let temp_dir = TempDir::new().unwrap();
    let store = CheckpointStore::new(temp_dir.path().join("meta_info.json"));

    store.write(&checkpoint("2022-01-01")).unwrap();
    store.write(&checkpoint("2022-02-01")).unwrap();

    let entries: Vec<_> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("meta_info.json")]);
    assert_eq!(store.read().unwrap().to_date(), parse_date("2022-02-01").unwrap());
}

#[test]
fn test_remove_then_read_optional_is_none() {
    let temp_dir = TempDir::new().unwrap();
    let store = CheckpointStore::new(temp_dir.path().join("meta_info.json"));
    store.write(&checkpoint("2022-01-01")).unwrap();

    assert!(store.remove().unwrap());
    assert!(!store.remove().unwrap());
    assert!(store.read_optional().unwrap().is_none());
    assert!(matches!(store.read(), Err(CheckpointError::NotFound(_))));
}

#[test]
fn test_lock_is_released_on_drop() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("meta_info.json");

    {
        let mut first = RunLock::open(&path).unwrap();
        let _guard = first.try_acquire().unwrap();

        let mut second = RunLock::open(&path).unwrap();
        assert!(matches!(second.try_acquire(), Err(CheckpointError::Lock(_))));
    }

    let mut third = RunLock::open(&path).unwrap();
    assert!(third.try_acquire().is_ok());
}
