//! CLI error types and conversions

use crate::downloader::IngestionError;
use crate::output::OutputError;
use crate::resume::CheckpointError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Ingestion run failed
    #[error("ingestion error: {0}")]
    IngestionError(#[from] IngestionError),

    /// Checkpoint error
    #[error("checkpoint error: {0}")]
    CheckpointError(#[from] CheckpointError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// Checkpoint verification found a problem
    #[error("verification failed: {0}")]
    VerificationFailed(String),
}
