//! Date range partitioning into fetch windows
//!
//! A requested range is split into contiguous, non-overlapping windows whose
//! size depends on the total span:
//!
//! - span > 365 days: yearly windows (boundaries on January 1st)
//! - span > 30 days: monthly windows (boundaries on the 1st of the month)
//! - otherwise: weekly windows (boundaries on Mondays)
//!
//! The first window starts at `from_date`, the last one ends exactly at
//! `to_date`, and windows are returned earliest first.
//!
//! ```rust
//! use complaint_ingest::{plan, parse_date, DateRange};
//!
//! let range = DateRange::new(
//!     parse_date("2020-01-15").unwrap(),
//!     parse_date("2020-03-10").unwrap(),
//! ).unwrap();
//!
//! let windows = plan(range);
//! assert_eq!(windows.len(), 3);
//! assert_eq!(windows[0].to_string(), "2020-01-15..2020-02-01");
//! assert_eq!(windows[2].to_string(), "2020-03-01..2020-03-10");
//! ```

use crate::DateRange;
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Spans above this many days are fetched in yearly windows.
pub const YEARLY_THRESHOLD_DAYS: i64 = 365;

/// Spans above this many days (and not yearly) are fetched in monthly windows.
pub const MONTHLY_THRESHOLD_DAYS: i64 = 30;

/// Window size chosen for a range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Calendar years
    Yearly,
    /// Calendar months
    Monthly,
    /// ISO weeks (Monday to Monday)
    Weekly,
}

impl Granularity {
    /// Pick the granularity for a span of `span_days` days.
    pub fn for_span(span_days: i64) -> Self {
        if span_days > YEARLY_THRESHOLD_DAYS {
            Granularity::Yearly
        } else if span_days > MONTHLY_THRESHOLD_DAYS {
            Granularity::Monthly
        } else {
            Granularity::Weekly
        }
    }

    /// First period boundary strictly after `date`.
    ///
    /// Returns `None` only when the boundary would overflow the calendar.
    pub fn next_boundary(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Yearly => NaiveDate::from_ymd_opt(date.year() + 1, 1, 1),
            Granularity::Monthly => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?
                .checked_add_months(Months::new(1)),
            Granularity::Weekly => {
                let to_monday = 7 - u64::from(date.weekday().num_days_from_monday());
                date.checked_add_days(Days::new(to_monday))
            }
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Granularity::Yearly => "yearly",
            Granularity::Monthly => "monthly",
            Granularity::Weekly => "weekly",
        };
        f.write_str(label)
    }
}

/// Split `range` into chronologically ordered fetch windows.
///
/// An empty range (`from_date == to_date`) yields no windows.
pub fn plan(range: DateRange) -> Vec<DateRange> {
    if range.is_empty() {
        return Vec::new();
    }

    let granularity = Granularity::for_span(range.span_days());
    let end = range.to_date();
    let mut windows = Vec::new();
    let mut start = range.from_date();

    while start < end {
        // Clamp so the final window never overshoots the requested upper bound
        let boundary = granularity
            .next_boundary(start)
            .map_or(end, |next| next.min(end));

        windows.push(DateRange::new(start, boundary).unwrap_or(range));
        start = boundary;
    }

    debug!(
        range = %range,
        granularity = %granularity,
        windows = windows.len(),
        "Planned fetch windows"
    );

    windows
}
