//! Ingestion run coordinator

use super::window::{FetchOutcome, FetchWindow};
use super::window_fetcher::WindowFetcher;
use super::IngestionError;
use crate::config::IngestionConfig;
use crate::fetcher::SourceFetcher;
use crate::metrics::{record_checkpoint_write, RunMetrics};
use crate::output::path::window_file_path;
use crate::output::{ArtifactMerger, ColumnarStore, MergeReport};
use crate::planner::{plan, Granularity};
use crate::resume::{CheckpointStore, IngestionCheckpoint, RunLock};
use crate::shutdown::{self, SharedShutdown};
use crate::DateRange;
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

/// Result of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct IngestionArtifact {
    /// Merged artifact location
    pub artifact_path: PathBuf,
    /// Checkpoint location
    pub checkpoint_path: PathBuf,
    /// This run's download directory
    pub run_directory: PathBuf,
    /// What happened during the run
    pub summary: RunSummary,
}

/// Per-run report
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Range actually planned and fetched
    pub effective_range: DateRange,
    /// Whether the lower bound came from a previous checkpoint
    pub resumed_from_checkpoint: bool,
    /// Window size chosen (absent when nothing was fetched)
    pub granularity: Option<Granularity>,
    /// Windows planned
    pub windows_planned: usize,
    /// Windows fetched successfully
    pub windows_succeeded: usize,
    /// Quarantine files of windows that exhausted their retries
    pub quarantined: Vec<PathBuf>,
    /// Records written to window files
    pub records_fetched: u64,
    /// Rows appended to the artifact
    pub rows_appended: u64,
    /// Window files the merger could not read
    pub merge_files_skipped: usize,
    /// Checkpoint written at the end of the run
    pub checkpoint: IngestionCheckpoint,
}

/// Drives one ingestion run
pub struct IngestionCoordinator {
    config: IngestionConfig,
    fetcher: Arc<dyn SourceFetcher>,
    store: Arc<dyn ColumnarStore>,
    shutdown: Option<SharedShutdown>,
    backoff: bool,
    progress: Option<ProgressBar>,
}

impl IngestionCoordinator {
    /// Create a coordinator
    pub fn new(
        config: IngestionConfig,
        fetcher: Arc<dyn SourceFetcher>,
        store: Arc<dyn ColumnarStore>,
    ) -> Self {
        Self {
            config,
            fetcher,
            store,
            shutdown: shutdown::get_global_shutdown(),
            backoff: false,
            progress: None,
        }
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Sleep with exponential backoff between window retries
    pub fn with_backoff(mut self, backoff: bool) -> Self {
        self.backoff = backoff;
        self
    }

    /// Advance `progress` once per finished window
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run configuration
    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    /// Resolve, plan, fetch, merge and checkpoint.
    pub async fn run(&self) -> Result<IngestionArtifact, IngestionError> {
        let span = info_span!(
            "ingestion_run",
            pipeline = %self.config.pipeline_name,
            run_dir = %self.config.run_dir.display(),
        );
        let metrics = RunMetrics::start(&self.config.pipeline_name);

        let result = self.execute().instrument(span).await;
        match &result {
            Ok(artifact) => metrics.record_success(
                artifact.summary.windows_planned,
                artifact.summary.quarantined.len(),
            ),
            Err(e) => metrics.record_failure(&e.to_string()),
        }
        result
    }

    async fn execute(&self) -> Result<IngestionArtifact, IngestionError> {
        self.config.validate().map_err(IngestionError::InvalidConfig)?;

        // Held until the checkpoint is written
        let mut run_lock =
            RunLock::open(&self.config.metadata_file_path).map_err(IngestionError::Lock)?;
        let _guard = run_lock.try_acquire().map_err(IngestionError::Lock)?;

        let checkpoint_store = CheckpointStore::new(&self.config.metadata_file_path);
        let prior = checkpoint_store
            .read_optional()
            .map_err(IngestionError::CheckpointRead)?;

        let effective_range = resolve_range(&self.config, prior.as_ref())?;
        info!(
            requested_from = %self.config.floor_from_date(),
            requested_to = %self.config.to_date,
            effective = %effective_range,
            resumed = prior.is_some(),
            "Resolved ingestion range"
        );

        create_run_dir(&self.config.download_dir)?;

        let windows = plan(effective_range);
        let granularity =
            (!windows.is_empty()).then(|| Granularity::for_span(effective_range.span_days()));
        if windows.is_empty() {
            info!("Nothing new to fetch");
        }

        let outcomes = match self.fetch_windows(&windows).await {
            Ok(outcomes) => outcomes,
            Err(IngestionError::Cancelled) => return Err(self.abort()),
            Err(e) => return Err(e),
        };

        if self.shutdown_requested() {
            return Err(self.abort());
        }

        let report = self.merge().await?;

        let checkpoint = next_checkpoint(&self.config, prior.as_ref())?;
        if let Err(e) = checkpoint_store.write(&checkpoint) {
            record_checkpoint_write(false);
            error!(
                path = %checkpoint_store.path().display(),
                error = %e,
                "Merged data but failed to save checkpoint; the next run will fetch this range again"
            );
            return Err(IngestionError::CheckpointWrite(e));
        }
        record_checkpoint_write(true);

        let summary = summarize(
            effective_range,
            prior.is_some(),
            granularity,
            &outcomes,
            &report,
            checkpoint,
        );

        Ok(IngestionArtifact {
            artifact_path: self.config.artifact_path(),
            checkpoint_path: self.config.metadata_file_path.clone(),
            run_directory: self.config.download_dir.clone(),
            summary,
        })
    }

    async fn fetch_windows(
        &self,
        windows: &[DateRange],
    ) -> Result<Vec<FetchOutcome>, IngestionError> {
        let mut window_fetcher = WindowFetcher::from_config(self.fetcher.clone(), &self.config)
            .with_backoff(self.backoff);
        if let Some(shutdown) = &self.shutdown {
            window_fetcher = window_fetcher.with_shutdown(shutdown.clone());
        }

        if let Some(progress) = &self.progress {
            progress.set_length(windows.len() as u64);
        }

        let window_fetcher = &window_fetcher;
        let fetches = windows.iter().map(move |range| {
            let target = window_file_path(&self.config.download_dir, &self.config.file_name, range);
            let window = FetchWindow::new(*range, target, self.config.n_retry);
            async move {
                let outcome = window_fetcher.fetch(window).await;
                if let Some(progress) = &self.progress {
                    progress.inc(1);
                }
                outcome
            }
        });

        // `buffered` keeps outcomes in window order
        let mut results = stream::iter(fetches).buffered(self.config.concurrency.max(1));
        let mut outcomes = Vec::with_capacity(windows.len());
        while let Some(outcome) = results.next().await {
            outcomes.push(outcome?);
        }
        Ok(outcomes)
    }

    async fn merge(&self) -> Result<MergeReport, IngestionError> {
        let merger = ArtifactMerger::new(self.store.clone());
        let window_dir = self.config.download_dir.clone();
        let artifact = self.config.artifact_path();

        let report = tokio::task::spawn_blocking(move || merger.merge(&window_dir, &artifact))
            .await
            .map_err(|e| IngestionError::Task(e.to_string()))??;
        Ok(report)
    }

    /// Drop this run's window files so they cannot be merged later.
    fn abort(&self) -> IngestionError {
        warn!(
            download_dir = %self.config.download_dir.display(),
            "Shutdown requested, discarding downloaded windows"
        );
        if let Err(e) = std::fs::remove_dir_all(&self.config.download_dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, "Failed to remove download directory");
            }
        }
        IngestionError::Cancelled
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }
}

/// Effective range of a run.
///
/// The lower bound is the previous checkpoint's `to_date` when one exists,
/// otherwise the requested `from_date`; either way it is raised to the minimum
/// start date. A checkpoint already past the requested `to_date` yields an
/// empty range rather than going backwards.
pub fn resolve_range(
    config: &IngestionConfig,
    prior: Option<&IngestionCheckpoint>,
) -> Result<DateRange, IngestionError> {
    let from_date = prior
        .map_or(config.from_date, |checkpoint| checkpoint.to_date())
        .max(config.min_start_date)
        .min(config.to_date);

    DateRange::new(from_date, config.to_date)
        .map_err(|e| IngestionError::InvalidConfig(e.to_string()))
}

/// Checkpoint to persist after a successful merge.
///
/// `to_date` never moves backwards relative to `prior`.
pub fn next_checkpoint(
    config: &IngestionConfig,
    prior: Option<&IngestionCheckpoint>,
) -> Result<IngestionCheckpoint, IngestionError> {
    let to_date = prior.map_or(config.to_date, |checkpoint| {
        checkpoint.to_date().max(config.to_date)
    });

    IngestionCheckpoint::new(config.floor_from_date(), to_date, config.artifact_path())
        .map_err(|e| IngestionError::InvalidConfig(e.to_string()))
}

fn summarize(
    effective_range: DateRange,
    resumed_from_checkpoint: bool,
    granularity: Option<Granularity>,
    outcomes: &[FetchOutcome],
    report: &MergeReport,
    checkpoint: IngestionCheckpoint,
) -> RunSummary {
    let quarantined: Vec<PathBuf> = outcomes
        .iter()
        .filter(|outcome| !outcome.is_success())
        .map(|outcome| outcome.path().to_path_buf())
        .collect();

    RunSummary {
        effective_range,
        resumed_from_checkpoint,
        granularity,
        windows_planned: outcomes.len(),
        windows_succeeded: outcomes.len() - quarantined.len(),
        quarantined,
        records_fetched: outcomes.iter().map(FetchOutcome::records).sum(),
        rows_appended: report.rows_appended,
        merge_files_skipped: report.files_skipped.len(),
        checkpoint,
    }
}

/// Create this run's download directory, refusing one left by an earlier run.
///
/// Everything in the directory is merged, so reusing it would append the
/// earlier run's windows a second time.
fn create_run_dir(path: &Path) -> Result<(), IngestionError> {
    let io_err = |e: std::io::Error| IngestionError::Io {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    match std::fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(IngestionError::RunDirectoryExists(path.to_path_buf()))
        }
        Err(e) => Err(io_err(e)),
    }
}
