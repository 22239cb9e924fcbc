//! Inline-styled HTML tables for mail clients that drop stylesheets

use quick_xml::escape::escape;

use super::aggregate::{AggregateRow, AggregateTable, Severity};

const TABLE_STYLE: &str = "border-collapse:collapse;font-family:Arial,sans-serif;font-size:13px";
const CELL_STYLE: &str = "border:1px solid #999999;padding:4px 8px";
const HEADER_STYLE: &str = "background-color:#404040;color:#ffffff";
const FOOTER_STYLE: &str = "background-color:#e0e0e0;font-weight:bold";
const HIGHLIGHT_STYLE: &str = "background-color:#fff5cc;font-weight:bold";

/// Distinct totals that count as "top" for highlighting
const TOP_TOTALS: usize = 5;

fn severity_style(severity: Severity) -> &'static str {
    match severity {
        Severity::High | Severity::Critical => "background-color:#ffcccc",
        Severity::Medium => "background-color:#ffe6cc",
        Severity::Low => "background-color:#ccffcc",
    }
}

/// Smallest of the top distinct totals, never below 1
fn highlight_threshold(rows: &[&AggregateRow]) -> usize {
    let mut totals: Vec<usize> = rows.iter().map(|r| r.total).collect();
    totals.sort_unstable_by(|a, b| b.cmp(a));
    totals.dedup();
    totals
        .into_iter()
        .take(TOP_TOTALS)
        .min()
        .unwrap_or(0)
        .max(1)
}

pub fn is_highlighted(row: &AggregateRow, threshold: usize) -> bool {
    row.has_elevated() || row.total >= threshold
}

/// Render one aggregate table.
///
/// Rows are ordered by total, largest first, ties in first-seen order. A
/// severity column is shown only when its grand total is non-zero.
pub fn render_table(table: &AggregateTable, title: &str) -> String {
    let mut rows: Vec<&AggregateRow> = table.rows.iter().collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total));

    let columns: Vec<Severity> = Severity::ALL
        .into_iter()
        .filter(|s| table.totals.count(*s) > 0)
        .collect();
    let threshold = highlight_threshold(&rows);

    let mut html = String::new();
    html.push_str(&format!("<table style=\"{}\">\n", TABLE_STYLE));
    html.push_str(&format!(
        "<caption style=\"font-weight:bold;text-align:left;padding:4px 0\">{}</caption>\n",
        escape(title)
    ));

    html.push_str("<thead><tr>");
    html.push_str(&header_cell("Owner"));
    for severity in &columns {
        html.push_str(&header_cell(severity.as_str()));
    }
    html.push_str(&header_cell("Total"));
    html.push_str("</tr></thead>\n<tbody>\n");

    for row in &rows {
        if is_highlighted(row, threshold) {
            html.push_str(&format!(r#"<tr style="{}">"#, HIGHLIGHT_STYLE));
        } else {
            html.push_str("<tr>");
        }
        write_cells(&mut html, row, &columns, "");
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n");

    html.push_str(&format!(r#"<tfoot><tr style="{}">"#, FOOTER_STYLE));
    write_cells(&mut html, &table.totals, &columns, FOOTER_STYLE);
    html.push_str("</tr></tfoot>\n</table>\n");
    html
}

fn header_cell(label: &str) -> String {
    format!(r#"<th style="{};{}">{}</th>"#, CELL_STYLE, HEADER_STYLE, label)
}

fn write_cells(html: &mut String, row: &AggregateRow, columns: &[Severity], extra: &str) {
    html.push_str(&format!(
        r#"<td style="{}{}">{}</td>"#,
        CELL_STYLE,
        style_suffix(extra),
        escape(row.owner.as_str())
    ));
    for severity in columns {
        let count = row.count(*severity);
        let style = if count > 0 && extra.is_empty() {
            format!("{};{}", CELL_STYLE, severity_style(*severity))
        } else {
            format!("{}{}", CELL_STYLE, style_suffix(extra))
        };
        html.push_str(&format!(
            r#"<td style="{};text-align:right">{}</td>"#,
            style, count
        ));
    }
    html.push_str(&format!(
        r#"<td style="{}{};text-align:right">{}</td>"#,
        CELL_STYLE,
        style_suffix(extra),
        row.total
    ));
}

fn style_suffix(extra: &str) -> String {
    if extra.is_empty() {
        String::new()
    } else {
        format!(";{}", extra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::aggregate::aggregate;
    use crate::report::record::Record;
    use std::collections::BTreeMap;

    fn record(owner: &str, severity: &str) -> Record {
        Record {
            row: 1,
            owner: owner.to_string(),
            severity: severity.to_string(),
            timestamp: "2024-01-01".to_string(),
            reference: None,
            fields: BTreeMap::new(),
        }
    }

    fn records(rows: &[(&str, &str, usize)]) -> Vec<Record> {
        rows.iter()
            .flat_map(|(owner, severity, n)| (0..*n).map(move |_| record(owner, severity)))
            .collect()
    }

    #[test]
    fn test_only_non_zero_severity_columns() {
        let table = aggregate(&records(&[("Network", "Low", 2), ("Storage", "low", 1)]));
        let html = render_table(&table, "Overdue");

        assert!(html.contains(">Low</th>"));
        assert!(!html.contains(">Medium</th>"));
        assert!(!html.contains(">High</th>"));
        assert!(!html.contains(">Critical</th>"));
        assert!(html.contains(">Total</th>"));
    }

    #[test]
    fn test_rows_sorted_by_total_with_stable_ties() {
        let table = aggregate(&records(&[
            ("Alpha", "Low", 1),
            ("Bravo", "Low", 3),
            ("Charlie", "Low", 1),
        ]));
        let html = render_table(&table, "t");

        let bravo = html.find("Bravo").unwrap();
        let alpha = html.find("Alpha").unwrap();
        let charlie = html.find("Charlie").unwrap();
        assert!(bravo < alpha && alpha < charlie);
    }

    #[test]
    fn test_text_is_escaped() {
        let table = aggregate(&records(&[("R&D <core>", "Low", 1)]));
        let html = render_table(&table, "Due <soon>");
        assert!(html.contains("R&amp;D &lt;core&gt;"));
        assert!(html.contains("Due &lt;soon&gt;"));
        assert!(!html.contains("<core>"));
    }

    #[test]
    fn test_highlight_threshold() {
        let table = aggregate(&records(&[
            ("A", "Low", 7),
            ("B", "Low", 6),
            ("C", "Low", 5),
            ("D", "Low", 4),
            ("E", "Low", 3),
            ("F", "Low", 2),
            ("G", "Medium", 1),
        ]));
        let rows: Vec<&AggregateRow> = table.rows.iter().collect();
        let threshold = highlight_threshold(&rows);
        assert_eq!(threshold, 3);

        let flags: Vec<bool> = table
            .rows
            .iter()
            .map(|r| is_highlighted(r, threshold))
            .collect();
        assert_eq!(flags, vec![true, true, true, true, true, false, true]);
    }

    #[test]
    fn test_threshold_floor_is_one() {
        assert_eq!(highlight_threshold(&[]), 1);
    }

    #[test]
    fn test_footer_carries_grand_total() {
        let table = aggregate(&records(&[("A", "High", 2), ("B", "Low", 1)]));
        let html = render_table(&table, "t");
        let footer = &html[html.find("<tfoot>").unwrap()..];
        assert!(footer.contains(">Total</td>"));
        assert!(footer.contains(">3</td>"));
    }
}
