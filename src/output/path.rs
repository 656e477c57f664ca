//! File naming for per-window and quarantine files
//!
//! Names embed the window bounds so a lexicographic directory listing is also
//! chronological:
//!
//! ```rust
//! use complaint_ingest::output::path::{window_file_name, quarantine_file_name};
//! use complaint_ingest::{parse_date, DateRange};
//!
//! let window = DateRange::new(
//!     parse_date("2021-01-01").unwrap(),
//!     parse_date("2021-02-01").unwrap(),
//! ).unwrap();
//!
//! assert_eq!(
//!     window_file_name("finance_complaint", &window),
//!     "finance_complaint_2021-01-01_2021-02-01.json"
//! );
//! assert_eq!(
//!     quarantine_file_name("finance_complaint", &window),
//!     "finance_complaint_2021-01-01_2021-02-01.raw"
//! );
//! ```

use crate::{DateRange, DATE_FORMAT};
use std::path::{Path, PathBuf};

/// Extension of validated per-window files
pub const WINDOW_FILE_EXTENSION: &str = "json";

/// Extension of quarantined raw responses
pub const QUARANTINE_FILE_EXTENSION: &str = "raw";

fn window_stem(file_name: &str, window: &DateRange) -> String {
    format!(
        "{}_{}_{}",
        sanitize_file_name(file_name),
        window.from_date().format(DATE_FORMAT),
        window.to_date().format(DATE_FORMAT)
    )
}

/// `<file_name>_<from>_<to>.json`
pub fn window_file_name(file_name: &str, window: &DateRange) -> String {
    format!("{}.{}", window_stem(file_name, window), WINDOW_FILE_EXTENSION)
}

/// `<file_name>_<from>_<to>.raw`
pub fn quarantine_file_name(file_name: &str, window: &DateRange) -> String {
    format!("{}.{}", window_stem(file_name, window), QUARANTINE_FILE_EXTENSION)
}

/// Full path of a window file inside `dir`
pub fn window_file_path(dir: &Path, file_name: &str, window: &DateRange) -> PathBuf {
    dir.join(window_file_name(file_name, window))
}

/// Full path of a quarantine file inside `dir`
pub fn quarantine_file_path(dir: &Path, file_name: &str, window: &DateRange) -> PathBuf {
    dir.join(quarantine_file_name(file_name, window))
}

/// Sanitize a base file name for filesystem safety
///
/// - `/`, `\`, `:` → `_` (directory separators)
/// - `..` → `__` (parent directory reference)
pub fn sanitize_file_name(name: &str) -> String {
    name.replace("..", "__").replace(['/', '\\', ':'], "_")
}

/// True when `path` has the window file extension.
pub fn is_window_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == WINDOW_FILE_EXTENSION)
}
