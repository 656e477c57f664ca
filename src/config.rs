//! Pipeline and ingestion configuration
//!
//! The layout under the artifact directory mirrors the training pipeline that
//! consumes the merged artifact:
//!
//! ```text
//! <artifact_dir>/data_ingestion/
//!     meta_info.json                      checkpoint
//!     feature_store/<file_name>/          merged Parquet dataset (long-lived)
//!     <timestamp>/downloaded_files/       per-window JSON files of one run
//!     <timestamp>/failed_downloaded_files quarantined raw responses of one run
//! ```

use crate::downloader::config::{DEFAULT_CONCURRENCY, DEFAULT_N_RETRY, PAYLOAD_FIELD};
use crate::fetcher::template::SourceUrlTemplate;
use crate::output::path::sanitize_file_name;
use chrono::{DateTime, NaiveDate, Utc};
use std::path::PathBuf;

/// Default pipeline name
pub const PIPELINE_NAME: &str = "finance-complaint";

/// Default root for all pipeline artifacts
pub const PIPELINE_ARTIFACT_DIR: &str = "finance_artifact";

/// Ingestion stage directory under the artifact root
pub const DATA_INGESTION_DIR: &str = "data_ingestion";

/// Per-run directory holding validated window files
pub const DATA_INGESTION_DOWNLOADED_DATA_DIR: &str = "downloaded_files";

/// Per-run directory holding quarantined responses
pub const DATA_INGESTION_FAILED_DIR: &str = "failed_downloaded_files";

/// Directory holding the merged artifact
pub const DATA_INGESTION_FEATURE_STORE_DIR: &str = "feature_store";

/// Checkpoint file name
pub const DATA_INGESTION_METADATA_FILE_NAME: &str = "meta_info.json";

/// Base name for window files and the merged artifact
pub const DATA_INGESTION_FILE_NAME: &str = "finance_complaint";

/// Earliest date the source serves data for
pub const DATA_INGESTION_MIN_START_DATE: &str = "2011-12-01";

/// Default source: consumer complaint search API
pub const DATA_INGESTION_DATA_SOURCE_URL: &str = "https://www.consumerfinance.gov/data-research/consumer-complaints/search/api/v1/?date_received_max=<todate>&date_received_min=<fromdate>&field=all&format=json";

/// Run directory timestamp format
pub const TIMESTAMP_FORMAT: &str = "%m_%d_%Y_%H_%M_%S";

/// Wall-clock capability
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar date (UTC), the default upper bound of a run.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// System time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Format a run timestamp used as the per-run directory name.
pub fn run_timestamp(now: DateTime<Utc>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// Pipeline-wide settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Pipeline name (used in logs)
    pub pipeline_name: String,
    /// Root directory for all artifacts
    pub artifact_dir: PathBuf,
}

impl PipelineConfig {
    /// Create a pipeline config
    pub fn new(pipeline_name: impl Into<String>, artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            artifact_dir: artifact_dir.into(),
        }
    }

    /// Ingestion stage root: `<artifact_dir>/data_ingestion`
    pub fn data_ingestion_dir(&self) -> PathBuf {
        self.artifact_dir.join(DATA_INGESTION_DIR)
    }

    /// Checkpoint location shared by every run of this pipeline
    pub fn metadata_file_path(&self) -> PathBuf {
        self.data_ingestion_dir().join(DATA_INGESTION_METADATA_FILE_NAME)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(PIPELINE_NAME, PIPELINE_ARTIFACT_DIR)
    }
}

/// Settings for one ingestion run
///
/// Built with [`IngestionConfig::new`] and refined with the `with_*` methods.
/// The requested `from_date` is only a floor for the very first run: once a
/// checkpoint exists the coordinator resumes from the checkpoint instead.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Owning pipeline (used in logs and metrics)
    pub pipeline_name: String,
    /// Requested lower bound (first-run default)
    pub from_date: NaiveDate,
    /// Requested upper bound
    pub to_date: NaiveDate,
    /// Earliest date ever fetched
    pub min_start_date: NaiveDate,
    /// `<data_ingestion>/<timestamp>`
    pub run_dir: PathBuf,
    /// Per-run window files
    pub download_dir: PathBuf,
    /// Per-run quarantine files
    pub failed_dir: PathBuf,
    /// Directory of the merged artifact
    pub feature_store_dir: PathBuf,
    /// Base name for window files and the artifact
    pub file_name: String,
    /// Checkpoint location
    pub metadata_file_path: PathBuf,
    /// Source URL with date placeholders
    pub source_url: SourceUrlTemplate,
    /// Attempts per window before quarantine
    pub n_retry: u32,
    /// Concurrent window fetches
    pub concurrency: usize,
    /// Field carrying each record's payload
    pub payload_field: String,
}

impl IngestionConfig {
    /// Build the default configuration for a run starting now.
    ///
    /// `from_date` defaults to the minimum start date and `to_date` to today.
    pub fn new(pipeline: &PipelineConfig, clock: &dyn Clock) -> Self {
        let min_start_date = default_min_start_date();
        let master_dir = pipeline.data_ingestion_dir();
        let run_dir = master_dir.join(run_timestamp(clock.now()));

        Self {
            pipeline_name: pipeline.pipeline_name.clone(),
            from_date: min_start_date,
            to_date: clock.today(),
            min_start_date,
            download_dir: run_dir.join(DATA_INGESTION_DOWNLOADED_DATA_DIR),
            failed_dir: run_dir.join(DATA_INGESTION_FAILED_DIR),
            run_dir,
            feature_store_dir: master_dir.join(DATA_INGESTION_FEATURE_STORE_DIR),
            file_name: DATA_INGESTION_FILE_NAME.to_string(),
            metadata_file_path: pipeline.metadata_file_path(),
            source_url: SourceUrlTemplate::default(),
            n_retry: DEFAULT_N_RETRY,
            concurrency: DEFAULT_CONCURRENCY,
            payload_field: PAYLOAD_FIELD.to_string(),
        }
    }

    /// Set the requested lower bound
    pub fn with_from_date(mut self, from_date: NaiveDate) -> Self {
        self.from_date = from_date;
        self
    }

    /// Set the requested upper bound
    pub fn with_to_date(mut self, to_date: NaiveDate) -> Self {
        self.to_date = to_date;
        self
    }

    /// Set the minimum permitted start date
    pub fn with_min_start_date(mut self, min_start_date: NaiveDate) -> Self {
        self.min_start_date = min_start_date;
        self
    }

    /// Set the source URL template
    pub fn with_source_url(mut self, source_url: SourceUrlTemplate) -> Self {
        self.source_url = source_url;
        self
    }

    /// Set attempts per window (at least one attempt is always made)
    pub fn with_n_retry(mut self, n_retry: u32) -> Self {
        self.n_retry = n_retry;
        self
    }

    /// Set the number of concurrent window fetches
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the base name used for window files and the artifact
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// Set the payload field extracted from each source record
    pub fn with_payload_field(mut self, payload_field: impl Into<String>) -> Self {
        self.payload_field = payload_field.into();
        self
    }

    /// Requested lower bound clamped to the minimum start date.
    pub fn floor_from_date(&self) -> NaiveDate {
        self.from_date.max(self.min_start_date)
    }

    /// Location of the merged artifact, always directly inside the feature store
    pub fn artifact_path(&self) -> PathBuf {
        self.feature_store_dir.join(sanitize_file_name(&self.file_name))
    }

    /// Check invariants that the builder methods cannot enforce.
    pub fn validate(&self) -> Result<(), String> {
        if self.floor_from_date() > self.to_date {
            return Err(format!(
                "from_date ({}) must not be after to_date ({})",
                self.floor_from_date(),
                self.to_date
            ));
        }

        if self.file_name.trim().is_empty() {
            return Err("file_name cannot be empty".to_string());
        }

        if self.payload_field.is_empty() {
            return Err("payload_field cannot be empty".to_string());
        }

        Ok(())
    }
}

fn default_min_start_date() -> NaiveDate {
    crate::parse_date(DATA_INGESTION_MIN_START_DATE).unwrap_or(NaiveDate::MIN)
}
