//! CLI command implementations

use crate::config::{PipelineConfig, PIPELINE_ARTIFACT_DIR, PIPELINE_NAME};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

pub mod checkpoint;
pub mod error;
pub mod ingest;

pub use checkpoint::CheckpointCommand;
pub use error::CliError;
pub use ingest::IngestArgs;

/// Command-line interface
#[derive(Debug, Parser)]
#[command(name = "complaint-ingest")]
#[command(about = "Incrementally ingest consumer complaint records into a Parquet artifact", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Root directory for pipeline artifacts
    #[arg(long, global = true, env = "INGEST_ARTIFACT_DIR", default_value = PIPELINE_ARTIFACT_DIR)]
    pub artifact_dir: PathBuf,

    /// Pipeline name used in logs and metrics
    #[arg(long, global = true, env = "INGEST_PIPELINE_NAME", default_value = PIPELINE_NAME)]
    pub pipeline_name: String,
}

impl Cli {
    /// Pipeline settings selected on the command line
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new(&self.pipeline_name, &self.artifact_dir)
    }
}

/// Subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch new windows, merge them into the artifact and advance the checkpoint
    Ingest(IngestArgs),

    /// Inspect, verify or reset the persisted checkpoint
    #[command(subcommand)]
    Checkpoint(CheckpointCommand),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}
