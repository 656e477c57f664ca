//! Ingestion tuning constants

use std::time::Duration;

/// Default attempts per window before its response is quarantined.
pub const DEFAULT_N_RETRY: u32 = 5;

/// Upper bound accepted for `n_retry` on the command line.
pub const MAX_N_RETRY: u32 = 20;

/// Field of each source record that holds the payload to keep.
pub const PAYLOAD_FIELD: &str = "_source";

/// Default number of windows fetched concurrently.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Maximum number of windows fetched concurrently.
pub const MAX_CONCURRENCY: usize = 32;

/// Initial backoff delay in milliseconds (only when backoff is enabled).
pub const INITIAL_BACKOFF_MS: u64 = 1000;

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30000;

/// Calculate exponential backoff delay
pub fn calculate_backoff(retry_count: u32) -> Duration {
    let factor = 2u64.checked_pow(retry_count).unwrap_or(u64::MAX);
    let delay_ms = INITIAL_BACKOFF_MS.saturating_mul(factor).min(MAX_BACKOFF_MS);
    Duration::from_millis(delay_ms)
}
