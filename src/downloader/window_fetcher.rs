//! Bounded-retry fetch of a single window
//!
//! Each attempt renders the source URL for the window, fetches it, keeps the
//! payload of every record and writes the window file atomically. A transport
//! error, a non-2xx status, an undecodable body and a failed write are all the
//! same thing here: a failed attempt. After the last failed attempt the raw
//! response is written to the quarantine directory and reported as
//! [`FetchOutcome::QuarantinedFailure`].

use super::config::calculate_backoff;
use super::window::{FetchOutcome, FetchWindow};
use super::IngestionError;
use crate::config::IngestionConfig;
use crate::fetcher::{FetcherError, SourceFetcher, SourceUrlTemplate};
use crate::metrics::{record_window_attempt, record_window_quarantined, record_window_records};
use crate::output::json::{extract_payloads, write_window_file};
use crate::output::path::quarantine_file_path;
use crate::shutdown::{self, SharedShutdown};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Why one attempt failed
#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error("transport error: {0}")]
    Transport(#[from] FetcherError),

    #[error("source returned HTTP {status}")]
    Status { status: u16, body: Bytes },

    #[error("invalid response: {reason}")]
    Validation { reason: String, body: Bytes },

    #[error("failed to write window file: {reason}")]
    Write { reason: String, body: Bytes },
}

impl AttemptError {
    /// Raw response body, when one was received
    fn body(&self) -> Option<&Bytes> {
        match self {
            AttemptError::Transport(_) => None,
            AttemptError::Status { body, .. }
            | AttemptError::Validation { body, .. }
            | AttemptError::Write { body, .. } => Some(body),
        }
    }
}

/// Fetches and persists one window at a time
#[derive(Clone)]
pub struct WindowFetcher {
    fetcher: Arc<dyn SourceFetcher>,
    template: SourceUrlTemplate,
    quarantine_dir: PathBuf,
    file_name: String,
    payload_field: String,
    backoff: bool,
    shutdown: Option<SharedShutdown>,
}

impl WindowFetcher {
    /// Create a window fetcher
    pub fn new(
        fetcher: Arc<dyn SourceFetcher>,
        template: SourceUrlTemplate,
        quarantine_dir: impl Into<PathBuf>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            template,
            quarantine_dir: quarantine_dir.into(),
            file_name: file_name.into(),
            payload_field: crate::downloader::config::PAYLOAD_FIELD.to_string(),
            backoff: false,
            shutdown: shutdown::get_global_shutdown(),
        }
    }

    /// Create a window fetcher from an ingestion config
    pub fn from_config(fetcher: Arc<dyn SourceFetcher>, config: &IngestionConfig) -> Self {
        Self::new(
            fetcher,
            config.source_url.clone(),
            &config.failed_dir,
            &config.file_name,
        )
        .with_payload_field(&config.payload_field)
    }

    /// Set the payload field kept from each record
    pub fn with_payload_field(mut self, payload_field: impl Into<String>) -> Self {
        self.payload_field = payload_field.into();
        self
    }

    /// Sleep with exponential backoff between attempts
    pub fn with_backoff(mut self, backoff: bool) -> Self {
        self.backoff = backoff;
        self
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Fetch `window` until it succeeds or its attempts run out.
    ///
    /// At least one attempt is made even if `retries_remaining` is zero. A
    /// quarantined window is an `Ok` outcome; `Err` means a local failure
    /// (quarantine file not writable, stale file not removable) or cancellation.
    pub async fn fetch(&self, mut window: FetchWindow) -> Result<FetchOutcome, IngestionError> {
        window.retries_remaining = window.retries_remaining.max(1);
        let url = self.template.render(&window.range);
        let mut attempts = 0u32;

        loop {
            if self.shutdown_requested() {
                return Err(IngestionError::Cancelled);
            }

            attempts += 1;
            let failure = match self.attempt(&url, &window.target_path).await {
                Ok(records) => {
                    record_window_attempt(true);
                    record_window_records(records);
                    debug!(
                        window = %window.range,
                        records = records,
                        attempts = attempts,
                        "Window fetched"
                    );
                    return Ok(FetchOutcome::Success {
                        window: window.range,
                        path: window.target_path,
                        records,
                        attempts,
                    });
                }
                Err(failure) => failure,
            };

            record_window_attempt(false);
            remove_stale_file(&window.target_path)?;
            window.retries_remaining -= 1;

            if window.retries_remaining == 0 {
                return self.quarantine(&window, attempts, failure).await;
            }

            warn!(
                window = %window.range,
                attempt = attempts,
                retries_remaining = window.retries_remaining,
                error = %failure,
                "Window fetch failed, retrying"
            );

            if self.backoff {
                self.wait_before_retry(attempts - 1).await?;
            }
        }
    }

    async fn attempt(&self, url: &str, target_path: &Path) -> Result<u64, AttemptError> {
        let response = self.fetcher.fetch(url).await?;

        if !response.is_success() {
            return Err(AttemptError::Status {
                status: response.status,
                body: response.body,
            });
        }

        let records = extract_payloads(&response.body, &self.payload_field).map_err(|e| {
            AttemptError::Validation {
                reason: e.to_string(),
                body: response.body.clone(),
            }
        })?;
        let count = records.len() as u64;

        let path = target_path.to_path_buf();
        let written = tokio::task::spawn_blocking(move || write_window_file(&path, &records)).await;
        match written {
            Ok(Ok(())) => Ok(count),
            Ok(Err(e)) => Err(AttemptError::Write {
                reason: e.to_string(),
                body: response.body,
            }),
            Err(e) => Err(AttemptError::Write {
                reason: e.to_string(),
                body: response.body,
            }),
        }
    }

    async fn quarantine(
        &self,
        window: &FetchWindow,
        attempts: u32,
        failure: AttemptError,
    ) -> Result<FetchOutcome, IngestionError> {
        let path = quarantine_file_path(&self.quarantine_dir, &self.file_name, &window.range);
        let last_error = failure.to_string();
        // No response at all: keep the error text so the file still explains the failure
        let contents = failure
            .body()
            .cloned()
            .unwrap_or_else(|| Bytes::from(last_error.clone()));

        let quarantine_err = |e: std::io::Error| IngestionError::Quarantine {
            path: path.clone(),
            reason: e.to_string(),
        };
        tokio::fs::create_dir_all(&self.quarantine_dir)
            .await
            .map_err(quarantine_err)?;
        tokio::fs::write(&path, &contents)
            .await
            .map_err(quarantine_err)?;

        record_window_quarantined();
        warn!(
            window = %window.range,
            attempts = attempts,
            quarantine = %path.display(),
            error = %last_error,
            "Window quarantined after exhausting retries"
        );

        Ok(FetchOutcome::QuarantinedFailure {
            original_window: window.range,
            raw_response_path: path,
            attempts,
            last_error,
        })
    }

    async fn wait_before_retry(&self, retry_count: u32) -> Result<(), IngestionError> {
        let backoff = calculate_backoff(retry_count);
        debug!(backoff_ms = backoff.as_millis(), "Waiting before retry");

        if let Some(shutdown) = &self.shutdown {
            tokio::select! {
                _ = tokio::time::sleep(backoff) => Ok(()),
                _ = shutdown.wait_for_shutdown() => Err(IngestionError::Cancelled),
            }
        } else {
            tokio::time::sleep(backoff).await;
            Ok(())
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }
}

fn remove_stale_file(path: &Path) -> Result<(), IngestionError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed stale window file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(IngestionError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}
