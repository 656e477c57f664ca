//! Integration tests for logging and tracing

use complaint_ingest::{parse_date, plan, DateRange};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[test]
fn test_tracing_subscriber_initialization() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("complaint_ingest=debug")),
        )
        .with_test_writer()
        .try_init();

    // Installed here or by another test in this binary
    assert!(tracing::dispatcher::has_been_set());
}

#[test]
fn test_library_logs_under_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("complaint_ingest=trace"))
        .with_test_writer()
        .try_init();

    let range = DateRange::new(
        parse_date("2020-01-01").unwrap(),
        parse_date("2020-03-01").unwrap(),
    )
    .unwrap();

    info!(range = %range, "Planning");
    let windows = plan(range);
    warn!(windows = windows.len(), "Planned");

    assert_eq!(windows.len(), 2);
}

#[test]
fn test_json_format_initialization() {
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new("complaint_ingest=info"))
        .with_test_writer()
        .try_init();

    assert!(tracing::dispatcher::has_been_set());
}

#[test]
fn test_env_filter_directives_parse() {
    assert!(EnvFilter::try_new("complaint_ingest=debug").is_ok());
    assert!(EnvFilter::try_new("complaint_ingest::downloader=trace,info").is_ok());
}
