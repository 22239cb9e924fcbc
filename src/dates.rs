//! Timestamp parsing and formatting
//!
//! All timestamps are interpreted as UTC. The accepted input formats and the
//! display format come from configuration; formats without a time component
//! resolve to midnight.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Input formats used when the configuration does not name any
pub fn default_timestamp_formats() -> Vec<String> {
    vec![
        "%Y-%m-%d %H:%M:%S".to_string(),
        "%Y-%m-%dT%H:%M:%S".to_string(),
        "%Y-%m-%d".to_string(),
        "%d/%m/%Y %H:%M:%S".to_string(),
        "%d/%m/%Y".to_string(),
    ]
}

pub fn default_display_format() -> String {
    "%Y-%m-%d %H:%M UTC".to_string()
}

/// Parse `raw` with the first format that accepts it.
///
/// RFC 3339 values carrying an explicit offset are always accepted and
/// converted to UTC.
pub fn parse_timestamp(raw: &str, formats: &[String]) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    formats.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(raw, format)
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(raw, format)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
            .map(|naive| Utc.from_utc_datetime(&naive))
    })
}

pub fn format_timestamp(ts: &DateTime<Utc>, format: &str) -> String {
    ts.format(format).to_string()
}

/// Check that a format string only uses specifiers chrono understands
pub fn is_valid_format(format: &str) -> bool {
    use chrono::format::{Item, StrftimeItems};
    !format.is_empty() && StrftimeItems::new(format).all(|item| !matches!(item, Item::Error))
}
