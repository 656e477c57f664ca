//! End-to-end ingestion runs against an in-process source

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use complaint_ingest::config::{FixedClock, IngestionConfig, PipelineConfig};
use complaint_ingest::downloader::{IngestionCoordinator, IngestionError};
use complaint_ingest::fetcher::{FetcherResult, RawResponse, SourceFetcher, SourceUrlTemplate};
use complaint_ingest::output::{ColumnarStore, OutputError, OutputResult, ParquetStore};
use complaint_ingest::resume::{CheckpointStore, IngestionCheckpoint, RunLock};
use complaint_ingest::shutdown::ShutdownCoordinator;
use complaint_ingest::{parse_date, Granularity, Record};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const TEMPLATE: &str = "http://source.test/api?min=<fromdate>&max=<todate>";

/// Serves two records per window, or a 500 for URLs containing a failing marker
#[derive(Default)]
struct FakeSource {
    calls: Mutex<Vec<String>>,
    failing: Vec<&'static str>,
}

impl FakeSource {
    fn failing(markers: &[&'static str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: markers.to_vec(),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_matching(&self, marker: &str) -> usize {
        self.calls().iter().filter(|url| url.contains(marker)).count()
    }
}

#[async_trait]
impl SourceFetcher for FakeSource {
    async fn fetch(&self, url: &str) -> FetcherResult<RawResponse> {
        self.calls.lock().unwrap().push(url.to_string());

        if self.failing.iter().any(|marker| url.contains(marker)) {
            return Ok(RawResponse::new(500, "upstream unavailable"));
        }

        let body = serde_json::json!([
            {"_index": "complaints", "_source": {"complaint_id": 1, "product": "Mortgage", "url": url}},
            {"_index": "complaints", "_source": {"complaint_id": 2, "product": "Credit card", "url": url}},
        ]);
        Ok(RawResponse::new(200, body.to_string()))
    }
}

/// Store whose appends always fail with an I/O error
struct BrokenStore;

impl ColumnarStore for BrokenStore {
    fn append_records(&self, _path: &Path, _records: &[Record]) -> OutputResult<u64> {
        Err(OutputError::IoError("disk full".to_string()))
    }

    fn count(&self, _path: &Path) -> OutputResult<u64> {
        Ok(0)
    }
}

fn config(root: &Path, run_hour: u32, from: &str, to: &str) -> IngestionConfig {
    let clock = FixedClock(Utc.with_ymd_and_hms(2022, 5, 17, run_hour, 0, 0).unwrap());
    IngestionConfig::new(&PipelineConfig::new("test", root), &clock)
        .with_from_date(parse_date(from).unwrap())
        .with_to_date(parse_date(to).unwrap())
        .with_source_url(SourceUrlTemplate::parse(TEMPLATE).unwrap())
        .with_n_retry(3)
        .with_concurrency(2)
}

fn coordinator(config: IngestionConfig, source: Arc<FakeSource>) -> IngestionCoordinator {
    IngestionCoordinator::new(config, source, Arc::new(ParquetStore::new()))
        .with_shutdown(ShutdownCoordinator::shared())
}

fn write_checkpoint(config: &IngestionConfig, from: &str, to: &str) -> CheckpointStore {
    let store = CheckpointStore::new(&config.metadata_file_path);
    let checkpoint = IngestionCheckpoint::new(
        parse_date(from).unwrap(),
        parse_date(to).unwrap(),
        config.artifact_path(),
    )
    .unwrap();
    store.write(&checkpoint).unwrap();
    store
}

#[tokio::test]
async fn test_first_run_fetches_merges_and_checkpoints() {
    let temp_dir = TempDir::new().unwrap();
    let source = Arc::new(FakeSource::default());
    let cfg = config(temp_dir.path(), 1, "2020-01-01", "2020-03-01");
    let artifact_path = cfg.artifact_path();
    let metadata_path = cfg.metadata_file_path.clone();

    let artifact = coordinator(cfg, source.clone()).run().await.unwrap();

    let summary = &artifact.summary;
    assert!(!summary.resumed_from_checkpoint);
    assert_eq!(summary.granularity, Some(Granularity::Monthly));
    assert_eq!(summary.windows_planned, 2);
    assert_eq!(summary.windows_succeeded, 2);
    assert!(summary.quarantined.is_empty());
    assert_eq!(summary.records_fetched, 4);
    assert_eq!(summary.rows_appended, 4);

    let mut calls = source.calls();
    calls.sort();
    assert_eq!(
        calls,
        vec![
            "http://source.test/api?min=2020-01-01&max=2020-02-01".to_string(),
            "http://source.test/api?min=2020-02-01&max=2020-03-01".to_string(),
        ]
    );

    assert_eq!(artifact.artifact_path, artifact_path);
    assert_eq!(ParquetStore::new().count(&artifact_path).unwrap(), 4);

    let checkpoint = CheckpointStore::new(&metadata_path).read().unwrap();
    assert_eq!(checkpoint.from_date(), parse_date("2020-01-01").unwrap());
    assert_eq!(checkpoint.to_date(), parse_date("2020-03-01").unwrap());
    assert_eq!(checkpoint.data_file_path(), artifact_path.as_path());
}

#[tokio::test]
async fn test_second_run_resumes_from_checkpoint_and_appends() {
    let temp_dir = TempDir::new().unwrap();
    let source = Arc::new(FakeSource::default());

    coordinator(config(temp_dir.path(), 1, "2020-01-01", "2020-03-01"), source.clone())
        .run()
        .await
        .unwrap();

    let resumed_source = Arc::new(FakeSource::default());
    let cfg = config(temp_dir.path(), 2, "2020-01-01", "2020-03-15");
    let artifact_path = cfg.artifact_path();
    let artifact = coordinator(cfg, resumed_source.clone()).run().await.unwrap();

    let summary = &artifact.summary;
    assert!(summary.resumed_from_checkpoint);
    assert_eq!(summary.effective_range.to_string(), "2020-03-01..2020-03-15");
    assert_eq!(summary.granularity, Some(Granularity::Weekly));
    // 2020-03-01 is a Sunday: 03-01..03-02, 03-02..03-09, 03-09..03-15
    assert_eq!(summary.windows_planned, 3);
    assert_eq!(resumed_source.calls_matching("min=2020-01-01"), 0);
    assert_eq!(resumed_source.calls_matching("min=2020-02-01"), 0);

    assert_eq!(ParquetStore::new().count(&artifact_path).unwrap(), 10);
    assert_eq!(summary.checkpoint.to_date(), parse_date("2020-03-15").unwrap());
    assert_eq!(summary.checkpoint.from_date(), parse_date("2020-01-01").unwrap());
}

#[tokio::test]
async fn test_run_with_nothing_new_fetches_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let source = Arc::new(FakeSource::default());
    let cfg = config(temp_dir.path(), 1, "2020-01-01", "2020-03-01");
    write_checkpoint(&cfg, "2020-01-01", "2020-03-01");

    let artifact = coordinator(cfg, source.clone()).run().await.unwrap();

    assert!(source.calls().is_empty());
    assert_eq!(artifact.summary.windows_planned, 0);
    assert_eq!(artifact.summary.granularity, None);
    assert_eq!(artifact.summary.rows_appended, 0);
    assert_eq!(
        artifact.summary.checkpoint.to_date(),
        parse_date("2020-03-01").unwrap()
    );
}

#[tokio::test]
async fn test_checkpoint_never_moves_backwards() {
    let temp_dir = TempDir::new().unwrap();
    let source = Arc::new(FakeSource::default());
    let cfg = config(temp_dir.path(), 1, "2020-01-01", "2020-06-01");
    let store = write_checkpoint(&cfg, "2020-01-01", "2020-09-01");

    coordinator(cfg, source.clone()).run().await.unwrap();

    assert!(source.calls().is_empty());
    assert_eq!(store.read().unwrap().to_date(), parse_date("2020-09-01").unwrap());
}

#[tokio::test]
async fn test_exhausted_window_is_quarantined_and_run_completes() {
    let temp_dir = TempDir::new().unwrap();
    let source = Arc::new(FakeSource::failing(&["min=2020-02-01"]));
    let cfg = config(temp_dir.path(), 1, "2020-01-01", "2020-03-01");
    let failed_dir = cfg.failed_dir.clone();
    let download_dir = cfg.download_dir.clone();
    let artifact_path = cfg.artifact_path();

    let artifact = coordinator(cfg, source.clone()).run().await.unwrap();

    // n_retry = 3 means exactly three attempts
    assert_eq!(source.calls_matching("min=2020-02-01"), 3);
    assert_eq!(source.calls_matching("min=2020-01-01"), 1);

    let summary = &artifact.summary;
    assert_eq!(summary.windows_succeeded, 1);
    assert_eq!(summary.quarantined.len(), 1);

    let quarantine_file = &summary.quarantined[0];
    assert!(quarantine_file.starts_with(&failed_dir));
    assert_eq!(
        std::fs::read_to_string(quarantine_file).unwrap(),
        "upstream unavailable"
    );

    // The failed window leaves no file to be merged
    let window_files: Vec<_> = std::fs::read_dir(&download_dir).unwrap().collect();
    assert_eq!(window_files.len(), 1);

    assert_eq!(ParquetStore::new().count(&artifact_path).unwrap(), 2);
    assert_eq!(
        summary.checkpoint.to_date(),
        parse_date("2020-03-01").unwrap()
    );
}

#[tokio::test]
async fn test_merge_failure_leaves_checkpoint_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let source = Arc::new(FakeSource::default());
    let cfg = config(temp_dir.path(), 1, "2020-01-01", "2020-06-01");
    let store = write_checkpoint(&cfg, "2020-01-01", "2020-03-01");
    let before = std::fs::read(store.path()).unwrap();

    let result = IngestionCoordinator::new(cfg, source, Arc::new(BrokenStore))
        .with_shutdown(ShutdownCoordinator::shared())
        .run()
        .await;

    assert!(matches!(result, Err(IngestionError::Merge(_))));
    assert_eq!(std::fs::read(store.path()).unwrap(), before);
}

#[tokio::test]
async fn test_corrupt_checkpoint_is_not_replaced() {
    let temp_dir = TempDir::new().unwrap();
    let source = Arc::new(FakeSource::default());
    let cfg = config(temp_dir.path(), 1, "2020-01-01", "2020-03-01");
    let metadata_path = cfg.metadata_file_path.clone();
    std::fs::create_dir_all(metadata_path.parent().unwrap()).unwrap();
    std::fs::write(&metadata_path, "{not json").unwrap();

    let result = coordinator(cfg, source.clone()).run().await;

    assert!(matches!(result, Err(IngestionError::CheckpointRead(_))));
    assert!(source.calls().is_empty());
    assert_eq!(std::fs::read_to_string(&metadata_path).unwrap(), "{not json");
}

#[tokio::test]
async fn test_concurrent_run_fails_fast_on_lock() {
    let temp_dir = TempDir::new().unwrap();
    let source = Arc::new(FakeSource::default());
    let cfg = config(temp_dir.path(), 1, "2020-01-01", "2020-03-01");

    let mut lock = RunLock::open(&cfg.metadata_file_path).unwrap();
    let _guard = lock.try_acquire().unwrap();

    let result = coordinator(cfg, source.clone()).run().await;

    assert!(matches!(result, Err(IngestionError::Lock(_))));
    assert!(source.calls().is_empty());
}

#[tokio::test]
async fn test_cancelled_run_discards_windows_and_keeps_checkpoint() {
    let temp_dir = TempDir::new().unwrap();
    let source = Arc::new(FakeSource::default());
    let cfg = config(temp_dir.path(), 1, "2020-01-01", "2020-03-01");
    let download_dir = cfg.download_dir.clone();
    let metadata_path = cfg.metadata_file_path.clone();

    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let result = IngestionCoordinator::new(cfg, source.clone(), Arc::new(ParquetStore::new()))
        .with_shutdown(shutdown)
        .run()
        .await;

    assert!(matches!(result, Err(IngestionError::Cancelled)));
    assert!(source.calls().is_empty());
    assert!(!download_dir.exists());
    assert!(!metadata_path.exists());
}

#[tokio::test]
async fn test_inverted_request_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let source = Arc::new(FakeSource::default());
    let cfg = config(temp_dir.path(), 1, "2020-03-01", "2020-01-01");

    let result = coordinator(cfg, source).run().await;
    assert!(matches!(result, Err(IngestionError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_empty_first_run_still_writes_checkpoint() {
    let temp_dir = TempDir::new().unwrap();
    let source = Arc::new(FakeSource::default());
    let cfg = config(temp_dir.path(), 1, "2020-01-01", "2020-01-01");
    let metadata_path = cfg.metadata_file_path.clone();

    let artifact = coordinator(cfg, source.clone()).run().await.unwrap();

    assert!(source.calls().is_empty());
    assert_eq!(artifact.summary.windows_planned, 0);

    let checkpoint = CheckpointStore::new(&metadata_path).read().unwrap();
    assert_eq!(checkpoint.from_date(), parse_date("2020-01-01").unwrap());
    assert_eq!(checkpoint.to_date(), parse_date("2020-01-01").unwrap());
}

#[tokio::test]
async fn test_always_failing_source_still_advances_checkpoint() {
    let temp_dir = TempDir::new().unwrap();
    let source = Arc::new(FakeSource::failing(&["source.test"]));
    // Monday to Friday: a single weekly window
    let cfg = config(temp_dir.path(), 1, "2020-01-06", "2020-01-10");
    let artifact_path = cfg.artifact_path();
    let failed_dir = cfg.failed_dir.clone();

    let artifact = coordinator(cfg, source.clone()).run().await.unwrap();

    assert_eq!(source.calls().len(), 3);
    assert_eq!(std::fs::read_dir(&failed_dir).unwrap().count(), 1);
    assert_eq!(artifact.summary.rows_appended, 0);
    assert_eq!(ParquetStore::new().count(&artifact_path).unwrap(), 0);
    assert_eq!(
        artifact.summary.checkpoint.to_date(),
        parse_date("2020-01-10").unwrap()
    );
}

#[tokio::test]
async fn test_run_with_same_timestamp_does_not_remerge_earlier_windows() {
    let temp_dir = TempDir::new().unwrap();
    let first = config(temp_dir.path(), 1, "2020-01-01", "2020-03-01");
    let artifact_path = first.artifact_path();
    let store = CheckpointStore::new(&first.metadata_file_path);

    coordinator(first, Arc::new(FakeSource::default()))
        .run()
        .await
        .unwrap();
    assert_eq!(ParquetStore::new().count(&artifact_path).unwrap(), 4);
    let checkpoint_before = std::fs::read(store.path()).unwrap();

    // Same clock, so the same run directory
    let second = config(temp_dir.path(), 1, "2020-01-01", "2020-03-01");
    let result = coordinator(second, Arc::new(FakeSource::default())).run().await;

    assert!(matches!(result, Err(IngestionError::RunDirectoryExists(_))));
    assert_eq!(ParquetStore::new().count(&artifact_path).unwrap(), 4);
    assert_eq!(std::fs::read(store.path()).unwrap(), checkpoint_before);
}
