//! Checkpoint subcommands

use super::{Cli, CliError, OutputFormat};
use crate::output::{ColumnarStore, ParquetStore};
use crate::resume::{CheckpointStore, IngestionCheckpoint, RunLock};
use clap::Subcommand;
use std::path::Path;

/// Inspect or reset the persisted checkpoint
#[derive(Subcommand, Debug, Clone)]
pub enum CheckpointCommand {
    /// Print the current checkpoint
    Show,
    /// Check that the checkpoint is readable and its artifact exists
    Verify,
    /// Delete the checkpoint so the next run starts from the requested range
    Reset {
        /// Required to actually delete the checkpoint
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

impl CheckpointCommand {
    /// Execute the checkpoint command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let store = CheckpointStore::new(cli.pipeline_config().metadata_file_path());
        match self {
            CheckpointCommand::Show => show(&store, cli.output_format),
            CheckpointCommand::Verify => verify(&store, cli.output_format),
            CheckpointCommand::Reset { force } => reset(&store, *force),
        }
    }
}

fn show(store: &CheckpointStore, format: OutputFormat) -> Result<(), CliError> {
    let checkpoint = store.read_optional()?;
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "path": store.path(),
                "checkpoint": checkpoint,
            });
            println!("{output}");
        }
        OutputFormat::Human => match checkpoint {
            Some(checkpoint) => print_checkpoint(store.path(), &checkpoint),
            None => println!("No checkpoint found at {}", store.path().display()),
        },
    }
    Ok(())
}

fn print_checkpoint(path: &Path, checkpoint: &IngestionCheckpoint) {
    println!("Checkpoint: {}", path.display());
    println!("  From: {}", checkpoint.from_date());
    println!("  To: {}", checkpoint.to_date());
    println!("  Artifact: {}", checkpoint.data_file_path().display());
}

fn verify(store: &CheckpointStore, format: OutputFormat) -> Result<(), CliError> {
    let checkpoint = store.read()?;
    let artifact = checkpoint.data_file_path();
    if !artifact.exists() {
        return Err(CliError::VerificationFailed(format!(
            "artifact {} referenced by {} does not exist",
            artifact.display(),
            store.path().display()
        )));
    }

    let rows = ParquetStore::new().count(artifact)?;
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "checkpoint": checkpoint,
                "rows": rows,
            });
            println!("{output}");
        }
        OutputFormat::Human => {
            print_checkpoint(store.path(), &checkpoint);
            println!("  Rows: {rows}");
            println!("Checkpoint is valid");
        }
    }
    Ok(())
}

fn reset(store: &CheckpointStore, force: bool) -> Result<(), CliError> {
    if !force {
        return Err(CliError::InvalidArgument(
            "refusing to delete the checkpoint without --force".to_string(),
        ));
    }

    let mut lock = RunLock::open(store.path())?;
    let _guard = lock.try_acquire()?;
    if store.remove()? {
        println!("Removed {}", store.path().display());
    } else {
        println!("No checkpoint found at {}", store.path().display());
    }
    Ok(())
}
