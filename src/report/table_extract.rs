//! Pulls the first HTML table out of a report JSON payload

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use tracing::{debug, info};

use super::csv_io::Table;
use crate::error::{ErrorCode, PipelineError, Result};

static UNCLOSED_TABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<table([^>]*?)></table\s+([^>]*?)>").expect("valid regex"));
static SELF_CLOSED_CELL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<(td|th)([^>]*?)/>").expect("valid regex"));
static DOUBLE_CLOSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</table>\s*</table>").expect("valid regex"));

static TABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<table\b[^>]*>(.*?)</table>").expect("valid regex"));
static THEAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<thead\b[^>]*>(.*?)</thead>").expect("valid regex"));
static TBODY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<tbody\b").expect("valid regex"));
static ROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").expect("valid regex"));
static CELL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(th|td)\b[^>]*>(.*?)</(?:th|td)>").expect("valid regex")
});
static NESTED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(?:div|span|a|p|strong|em|b|i)\b[^>]*>(.*?)</(?:div|span|a|p|strong|em|b|i)>")
        .expect("valid regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// HTML content of the first widget
pub fn widget_content(report: &Value) -> Result<&str> {
    let widget = report
        .get("widgets")
        .and_then(Value::as_array)
        .and_then(|w| w.first())
        .ok_or_else(|| invalid("report JSON has no 'widgets' entries"))?;
    widget
        .get("content")
        .and_then(Value::as_str)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| invalid("first widget has no 'content'"))
}

/// Repair markup the reporting widget is known to emit
pub fn clean_malformed_html(html: &str) -> Cow<'_, str> {
    if !UNCLOSED_TABLE_RE.is_match(html)
        && !SELF_CLOSED_CELL_RE.is_match(html)
        && !DOUBLE_CLOSE_RE.is_match(html)
    {
        return Cow::Borrowed(html);
    }
    let fixed = UNCLOSED_TABLE_RE.replace_all(html, "<table$1 $2>");
    let fixed = SELF_CLOSED_CELL_RE.replace_all(&fixed, "<$1$2></$1>");
    let fixed = DOUBLE_CLOSE_RE.replace_all(&fixed, "</table>");
    Cow::Owned(fixed.into_owned())
}

/// Text of a cell: the first nested element with text wins, then the cell's
/// own text
fn cell_text(inner: &str) -> String {
    let nested = NESTED_RE
        .captures_iter(inner)
        .map(|c| plain_text(&c[1]))
        .find(|t| !t.is_empty());
    nested.unwrap_or_else(|| plain_text(inner))
}

fn plain_text(fragment: &str) -> String {
    let stripped = TAG_RE.replace_all(fragment, " ");
    let collapsed = SPACE_RE.replace_all(stripped.trim(), " ");
    quick_xml::escape::unescape(&collapsed)
        .map(|t| t.into_owned())
        .unwrap_or_else(|_| collapsed.into_owned())
}

fn row_cells(row: &str) -> (Vec<String>, bool) {
    let mut any_header = false;
    let cells = CELL_RE
        .captures_iter(row)
        .map(|c| {
            any_header |= c[1].eq_ignore_ascii_case("th");
            cell_text(&c[2])
        })
        .collect();
    (cells, any_header)
}

/// First table of an HTML fragment. The header is the first `<thead>` row,
/// else the first row made of `<th>` cells, else the first row when the table
/// has no `<tbody>`. Rows without text are dropped and data rows are padded
/// or truncated to the header width.
pub fn extract_first_table(html: &str) -> Option<Table> {
    let html = clean_malformed_html(html);
    let body = TABLE_RE.captures(&html)?.get(1)?.as_str();

    let mut headers: Option<Vec<String>> = THEAD_RE
        .captures(body)
        .and_then(|c| ROW_RE.captures(c.get(1)?.as_str()).map(|r| row_cells(&r[1]).0));
    let has_thead = headers.is_some();
    let has_tbody = TBODY_RE.is_match(body);

    let mut rows = Vec::new();
    let data_part = match THEAD_RE.find(body) {
        Some(m) => Cow::Owned(format!("{}{}", &body[..m.start()], &body[m.end()..])),
        None => Cow::Borrowed(body),
    };
    for row in ROW_RE.captures_iter(&data_part) {
        let (cells, any_header) = row_cells(&row[1]);
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        if !has_thead && headers.is_none() && (any_header || !has_tbody) {
            headers = Some(cells);
            continue;
        }
        rows.push(cells);
    }

    let headers = headers.unwrap_or_default();
    if headers.is_empty() && rows.is_empty() {
        return None;
    }
    if !headers.is_empty() {
        for row in &mut rows {
            row.resize(headers.len(), String::new());
        }
    }
    debug!("Extracted headers: {:?}", headers);
    info!(
        "Extracted table with {} columns and {} rows",
        headers.len(),
        rows.len()
    );
    Some(Table { headers, rows })
}

/// Widget content to table, failing when there is nothing to extract
pub fn table_from_report(report: &Value) -> Result<Table> {
    let html = widget_content(report)?;
    extract_first_table(html).ok_or_else(|| invalid("no table found in widget content"))
}

fn invalid(message: &str) -> PipelineError {
    PipelineError::validation_with_code(ErrorCode::VALIDATION_INVALID_DATA, message, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WIDGET: &str = r#"<div class="x"><table class="list"><thead><tr><th></th><th>Actions</th><th>Number</th><th>Assignment group</th></tr></thead>
        <tbody>
        <tr><td></td><td></td><td><a href="/inc?sys_id=1">INC001</a></td><td><span>Network &amp; Edge</span></td></tr>
        <tr><td> </td><td/><td>INC002</td></tr>
        <tr><td></td><td></td><td></td><td></td></tr>
        </tbody></table><table><tr><td>second</td></tr></table></div>"#;

    #[test]
    fn test_first_table_with_thead() {
        let table = extract_first_table(WIDGET).unwrap();
        assert_eq!(table.headers, vec!["", "Actions", "Number", "Assignment group"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][2], "INC001");
        assert_eq!(table.rows[0][3], "Network & Edge");
        assert_eq!(table.rows[1], vec!["", "", "INC002", ""]);
    }

    #[test]
    fn test_first_row_is_header_without_thead() {
        let html = "<table><tr><td>A</td><td>B</td></tr><tr><td>1</td><td>2</td></tr></table>";
        let table = extract_first_table(html).unwrap();
        assert_eq!(table.headers, vec!["A", "B"]);
        assert_eq!(table.rows, vec![vec!["1".to_string(), "2".to_string()]]);
    }

    #[test]
    fn test_malformed_opening_tag_is_repaired() {
        let html = r#"<table></table class="list"><tr><th>A</th></tr><tr><td>1</td></tr></table>"#;
        let table = extract_first_table(html).unwrap();
        assert_eq!(table.headers, vec!["A"]);
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn test_widget_content_errors() {
        assert!(widget_content(&json!({})).is_err());
        assert!(widget_content(&json!({"widgets": [{"title": "x"}]})).is_err());
        let err = table_from_report(&json!({"widgets": [{"content": "<p>none</p>"}]})).unwrap_err();
        assert_eq!(err.code(), ErrorCode::VALIDATION_INVALID_DATA);
    }

    #[test]
    fn test_table_from_report() {
        let report = json!({"widgets": [{"content": WIDGET}]});
        let table = table_from_report(&report).unwrap();
        assert_eq!(table.column("Number"), Some(2));
    }
}
