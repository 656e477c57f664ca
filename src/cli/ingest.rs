//! Ingest command implementation

use super::{Cli, CliError, OutputFormat};
use crate::config::{Clock, IngestionConfig, PipelineConfig, SystemClock};
use crate::config::{DATA_INGESTION_FILE_NAME, DATA_INGESTION_MIN_START_DATE};
use crate::downloader::config::{
    DEFAULT_CONCURRENCY, DEFAULT_N_RETRY, MAX_CONCURRENCY, MAX_N_RETRY, PAYLOAD_FIELD,
};
use crate::downloader::{IngestionArtifact, IngestionCoordinator, IngestionError};
use crate::fetcher::{HttpSourceFetcher, SourceUrlTemplate};
use crate::output::ParquetStore;
use crate::shutdown::SharedShutdown;
use chrono::NaiveDate;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

/// Parse a `YYYY-MM-DD` argument
fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    crate::parse_date(s).map_err(|e| e.to_string())
}

/// Parse and validate concurrency value
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"
        ));
    }
    Ok(value)
}

/// Arguments of `ingest`
#[derive(Debug, Clone, Args)]
pub struct IngestArgs {
    /// First date to fetch (YYYY-MM-DD); only used when no checkpoint exists
    #[arg(long, value_parser = parse_date_arg)]
    pub from_date: Option<NaiveDate>,

    /// Upper bound of the run (YYYY-MM-DD, default: today)
    #[arg(long, value_parser = parse_date_arg)]
    pub to_date: Option<NaiveDate>,

    /// Earliest date the source serves
    #[arg(long, value_parser = parse_date_arg, default_value = DATA_INGESTION_MIN_START_DATE)]
    pub min_start_date: NaiveDate,

    /// Source URL with <fromdate> and <todate> placeholders
    #[arg(long, env = "INGEST_SOURCE_URL")]
    pub source_url: Option<SourceUrlTemplate>,

    /// Base name of window files and of the merged artifact
    #[arg(long, env = "INGEST_FILE_NAME", default_value = DATA_INGESTION_FILE_NAME)]
    pub file_name: String,

    /// Record field holding the payload to keep
    #[arg(long, default_value = PAYLOAD_FIELD)]
    pub payload_field: String,

    /// Attempts per window before its response is quarantined (range: 1-20)
    #[arg(long, default_value_t = DEFAULT_N_RETRY, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_N_RETRY)))]
    pub n_retry: u32,

    /// Number of windows fetched concurrently (default: 4, max: 32)
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY, value_parser = parse_concurrency)]
    pub concurrency: usize,

    /// Sleep with exponential backoff (1s doubling, capped at 30s) between retries
    #[arg(long, default_value_t = false)]
    pub backoff: bool,

    /// Serve Prometheus metrics on this address (e.g. 0.0.0.0:9090)
    #[arg(long, env = "INGEST_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    /// Hide the progress bar
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}

impl IngestArgs {
    /// Build the run configuration from these arguments.
    pub fn build_config(
        &self,
        pipeline: &PipelineConfig,
        clock: &dyn Clock,
    ) -> Result<IngestionConfig, CliError> {
        let mut config = IngestionConfig::new(pipeline, clock)
            .with_min_start_date(self.min_start_date)
            .with_file_name(&self.file_name)
            .with_payload_field(&self.payload_field)
            .with_n_retry(self.n_retry)
            .with_concurrency(self.concurrency);

        if let Some(from_date) = self.from_date {
            config = config.with_from_date(from_date);
        }
        if let Some(to_date) = self.to_date {
            config = config.with_to_date(to_date);
        }
        if let Some(source_url) = &self.source_url {
            config = config.with_source_url(source_url.clone());
        }

        config.validate().map_err(CliError::InvalidArgument)?;
        Ok(config)
    }

    /// Run one ingestion and print its summary.
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        if let Some(addr) = self.metrics_addr {
            crate::metrics::init_metrics(addr)
                .await
                .map_err(|e| CliError::ConfigurationError(e.to_string()))?;
        }

        let config = self.build_config(&cli.pipeline_config(), &SystemClock)?;
        info!(
            artifact_dir = %cli.artifact_dir.display(),
            source_url = %config.source_url,
            n_retry = config.n_retry,
            concurrency = config.concurrency,
            "Starting ingestion"
        );

        let progress = create_progress_bar(cli.output_format, self.no_progress);
        let coordinator = IngestionCoordinator::new(
            config,
            Arc::new(HttpSourceFetcher::shared()),
            Arc::new(ParquetStore::new()),
        )
        .with_shutdown(shutdown)
        .with_backoff(self.backoff)
        .with_progress(progress.clone());

        let result = coordinator.run().await;
        progress.finish_and_clear();

        match cli.output_format {
            OutputFormat::Json => output_json(&result),
            OutputFormat::Human => output_human(&result),
        }

        result.map(|_| ()).map_err(CliError::from)
    }
}

fn output_json(result: &Result<IngestionArtifact, IngestionError>) {
    let output = match result {
        Ok(artifact) => serde_json::json!({
            "success": true,
            "artifact": artifact,
            "error": null,
        }),
        Err(e) => serde_json::json!({
            "success": false,
            "artifact": null,
            "error": e.to_string(),
        }),
    };

    match serde_json::to_string(&output) {
        Ok(line) => println!("{line}"),
        Err(e) => error!("Failed to serialize output: {}", e),
    }
}

fn output_human(result: &Result<IngestionArtifact, IngestionError>) {
    match result {
        Ok(artifact) => {
            let summary = &artifact.summary;
            println!("\nIngestion completed successfully!");
            println!("Range: {}", summary.effective_range);
            if let Some(granularity) = summary.granularity {
                println!("Windows: {} ({})", summary.windows_planned, granularity);
            } else {
                println!("Windows: 0 (nothing new to fetch)");
            }
            println!("Records fetched: {}", summary.records_fetched);
            println!("Rows appended: {}", summary.rows_appended);
            println!("Artifact: {}", artifact.artifact_path.display());
            println!("Checkpoint: {} (to {})", artifact.checkpoint_path.display(), summary.checkpoint.to_date());
            if summary.merge_files_skipped > 0 {
                println!("Unreadable window files skipped: {}", summary.merge_files_skipped);
            }
            if !summary.quarantined.is_empty() {
                println!("Quarantined windows: {}", summary.quarantined.len());
                for path in &summary.quarantined {
                    println!("  {}", path.display());
                }
            }
        }
        Err(e) => {
            eprintln!("\nIngestion failed!");
            eprintln!("Error: {e}");
        }
    }
}

/// Create progress bar over windows; hidden for JSON output
fn create_progress_bar(output_format: OutputFormat, no_progress: bool) -> ProgressBar {
    if no_progress || output_format == OutputFormat::Json {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} windows {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message("Fetching");
    pb
}
