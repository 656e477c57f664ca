//! Observability metrics for ingestion runs
//!
//! Metric macros are no-ops until [`init_metrics`] installs the Prometheus
//! exporter, so library users pay nothing unless they opt in.
//!
//! ## Metrics
//!
//! - `window_attempts_total{result}` - fetch attempts per window (`success`, `failure`)
//! - `windows_quarantined_total` - windows that exhausted their retries
//! - `window_records_total` - records written to per-window files
//! - `merge_rows_appended_total` - rows appended to the merged artifact
//! - `merge_files_skipped_total` - window files the merger could not read
//! - `checkpoint_writes_total{result}` - checkpoint persist attempts
//! - `ingestion_runs_total{result}` - completed runs
//! - `ingestion_run_duration_seconds` - wall time per run

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent; a second call is a no-op.
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "window_attempts_total",
        Unit::Count,
        "Fetch attempts per window, labelled by result"
    );

    describe_counter!(
        "windows_quarantined_total",
        Unit::Count,
        "Windows whose raw response was quarantined after exhausting retries"
    );

    describe_counter!(
        "window_records_total",
        Unit::Count,
        "Records written to per-window files"
    );

    describe_counter!(
        "merge_rows_appended_total",
        Unit::Count,
        "Rows appended to the merged artifact"
    );

    describe_counter!(
        "merge_files_skipped_total",
        Unit::Count,
        "Window files skipped by the merger because they could not be read"
    );

    describe_counter!(
        "checkpoint_writes_total",
        Unit::Count,
        "Checkpoint persist attempts, labelled by result"
    );

    describe_counter!(
        "ingestion_runs_total",
        Unit::Count,
        "Completed ingestion runs, labelled by result"
    );

    describe_histogram!(
        "ingestion_run_duration_seconds",
        Unit::Seconds,
        "Ingestion run duration in seconds"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Check if metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

fn result_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

/// Record one fetch attempt for a window
pub fn record_window_attempt(success: bool) {
    counter!("window_attempts_total", "result" => result_label(success)).increment(1);
}

/// Record a quarantined window
pub fn record_window_quarantined() {
    counter!("windows_quarantined_total").increment(1);
}

/// Record records persisted for a window
pub fn record_window_records(records: u64) {
    counter!("window_records_total").increment(records);
}

/// Record rows appended by the merger
pub fn record_merge_rows(rows: u64) {
    counter!("merge_rows_appended_total").increment(rows);
}

/// Record a window file skipped by the merger
pub fn record_merge_file_skipped() {
    counter!("merge_files_skipped_total").increment(1);
}

/// Record a checkpoint persist attempt
pub fn record_checkpoint_write(success: bool) {
    counter!("checkpoint_writes_total", "result" => result_label(success)).increment(1);
}

/// Run-level metrics
pub struct RunMetrics {
    pipeline: String,
    start_time: Instant,
}

impl RunMetrics {
    /// Start tracking a run
    pub fn start(pipeline: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
            start_time: Instant::now(),
        }
    }

    /// Record a successful run
    pub fn record_success(&self, windows: usize, quarantined: usize) {
        let duration = self.start_time.elapsed();

        counter!(
            "ingestion_runs_total",
            "pipeline" => self.pipeline.clone(),
            "result" => "success",
        )
        .increment(1);
        histogram!("ingestion_run_duration_seconds").record(duration.as_secs_f64());

        info!(
            pipeline = %self.pipeline,
            windows = windows,
            quarantined = quarantined,
            duration_secs = duration.as_secs(),
            "Ingestion run completed"
        );
    }

    /// Record a failed run
    pub fn record_failure(&self, error: &str) {
        let duration = self.start_time.elapsed();

        counter!(
            "ingestion_runs_total",
            "pipeline" => self.pipeline.clone(),
            "result" => "failure",
        )
        .increment(1);
        histogram!("ingestion_run_duration_seconds").record(duration.as_secs_f64());

        error!(
            pipeline = %self.pipeline,
            error = %error,
            duration_secs = duration.as_secs(),
            "Ingestion run failed"
        );
    }
}
