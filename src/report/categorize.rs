//! Time bucketing of records relative to a reference instant

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use super::record::Record;
use crate::dates;

/// How records are split into time buckets
#[derive(Debug, Clone)]
pub struct BucketRules {
    /// Upper bounds in days, strictly increasing
    pub windows: Vec<u32>,
    pub timestamp_formats: Vec<String>,
}

impl BucketRules {
    pub fn new(windows: Vec<u32>, timestamp_formats: Vec<String>) -> Self {
        Self {
            windows,
            timestamp_formats,
        }
    }
}

impl Default for BucketRules {
    fn default() -> Self {
        Self::new(vec![10, 30], dates::default_timestamp_formats())
    }
}

#[derive(Debug, Clone)]
pub struct WindowBucket<'a> {
    pub days: u32,
    pub records: Vec<&'a Record>,
}

impl WindowBucket<'_> {
    pub fn label(&self) -> String {
        format!("Due in next {} days", self.days)
    }
}

/// A timestamp that matched no accepted format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub row: usize,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct Buckets<'a> {
    pub overdue: Vec<&'a Record>,
    pub windows: Vec<WindowBucket<'a>>,
    /// Due after the last window
    pub later: Vec<&'a Record>,
    /// Records with a parseable timestamp but no usable reference id,
    /// regardless of time bucket
    pub unspecified_reference: Vec<&'a Record>,
    pub parse_errors: Vec<ParseFailure>,
}

impl Buckets<'_> {
    /// Records that landed in a time bucket
    pub fn bucketed(&self) -> usize {
        self.overdue.len()
            + self.windows.iter().map(|w| w.records.len()).sum::<usize>()
            + self.later.len()
    }
}

/// Sort records into overdue, window and later buckets.
///
/// A record due exactly at `now` is overdue; a record due exactly at the end
/// of a window belongs to that window.
pub fn categorize<'a>(records: &'a [Record], now: DateTime<Utc>, rules: &BucketRules) -> Buckets<'a> {
    let mut buckets = Buckets {
        windows: rules
            .windows
            .iter()
            .map(|&days| WindowBucket {
                days,
                records: Vec::new(),
            })
            .collect(),
        ..Default::default()
    };

    for record in records {
        let Some(ts) = dates::parse_timestamp(&record.timestamp, &rules.timestamp_formats) else {
            warn!(
                "Row {}: cannot parse timestamp '{}'",
                record.row, record.timestamp
            );
            buckets.parse_errors.push(ParseFailure {
                row: record.row,
                value: record.timestamp.clone(),
            });
            continue;
        };

        if record.reference.is_none() {
            buckets.unspecified_reference.push(record);
        }

        if ts <= now {
            buckets.overdue.push(record);
            continue;
        }

        match buckets
            .windows
            .iter_mut()
            .find(|w| within_window(ts, now, w.days))
        {
            Some(window) => window.records.push(record),
            None => buckets.later.push(record),
        }
    }

    buckets
}

/// A window whose end is past the last representable instant has no upper
/// bound
fn within_window(ts: DateTime<Utc>, now: DateTime<Utc>, days: u32) -> bool {
    match now.checked_add_signed(Duration::days(i64::from(days))) {
        Some(end) => ts <= end,
        None => true,
    }
}
