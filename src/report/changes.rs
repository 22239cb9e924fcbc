//! Weekend change summary
//!
//! A change export is split on its tag column: tagged changes need a call-out
//! and are listed first, everything else goes into a collapsed "Standard
//! Changes" block. Both tables gain empty "Implement status" and "Comment
//! (Mandatory)" columns for the people running the changes to fill in.

use chrono::{Datelike, Duration, NaiveDate};
use quick_xml::escape::escape;
use serde::Serialize;
use std::path::Path;
use tera::{Context, Tera};
use tracing::{debug, info};

use super::csv_io::{self, Table};
use crate::config::{ChangeFormat, ChangeSettings};
use crate::error::{common, ErrorCode, PipelineError, Result};

pub const IMPLEMENT_STATUS_COLUMN: &str = "Implement status";
pub const COMMENT_COLUMN: &str = "Comment (Mandatory)";

const NO_DATA: &str = "<p>No data available</p>";

/// The two groups of a change export, tag column removed
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeGroups {
    pub call_out: Table,
    pub standard: Table,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangePage {
    pub title: String,
    pub call_out_count: usize,
    pub call_out_table: String,
    pub standard_count: usize,
    pub standard_table: String,
}

#[derive(Debug, Clone)]
pub struct ChangeRunSummary {
    pub title: String,
    pub call_out: usize,
    pub standard: usize,
}

/// Fails with every missing column named, not just the first
pub fn check_columns(table: &Table, required: &[String]) -> Result<()> {
    let missing: Vec<&str> = required
        .iter()
        .filter(|name| table.column(name).is_none())
        .map(String::as_str)
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(PipelineError::validation_with_code(
        ErrorCode::VALIDATION_MISSING_COLUMN,
        format!(
            "change export is missing columns {} (found: {})",
            missing.join(", "),
            table.headers.join(", ")
        ),
        missing.first().map(|m| m.to_string()),
    ))
}

/// Split rows on the tag column, preserving row order in each group
pub fn split_by_tag(table: &Table, tag_column: &str, call_out_tag: &str) -> Result<ChangeGroups> {
    let tag_index = table
        .column(tag_column)
        .ok_or_else(|| common::missing_required_field(tag_column))?;

    let kept: Vec<usize> = (0..table.headers.len()).filter(|i| *i != tag_index).collect();
    let mut headers: Vec<String> = kept.iter().map(|i| table.headers[*i].clone()).collect();
    for extra in [IMPLEMENT_STATUS_COLUMN, COMMENT_COLUMN] {
        if !headers.iter().any(|h| h == extra) {
            headers.push(extra.to_string());
        }
    }

    let mut groups = ChangeGroups {
        call_out: Table::new(headers.clone()),
        standard: Table::new(headers.clone()),
    };
    for row in &table.rows {
        let mut values: Vec<String> = kept
            .iter()
            .map(|i| row.get(*i).cloned().unwrap_or_default())
            .collect();
        values.resize(headers.len(), String::new());

        let tag = row.get(tag_index).map(|t| t.trim()).unwrap_or_default();
        if tag == call_out_tag {
            groups.call_out.rows.push(values);
        } else {
            groups.standard.rows.push(values);
        }
    }

    debug!(
        "Split changes: {} call-out, {} standard",
        groups.call_out.rows.len(),
        groups.standard.rows.len()
    );
    Ok(groups)
}

/// Background colour for an impact or risk value
pub fn level_style(value: &str) -> &'static str {
    let value = value.to_lowercase();
    if value.contains("high") || value.contains("critical") {
        "#ffcccc"
    } else if value.contains("medium") || value.contains("moderate") {
        "#ffe6cc"
    } else {
        "#ccffcc"
    }
}

fn header_cell(label: &str) -> String {
    if label == COMMENT_COLUMN {
        r#"<th><p>Comment <span style="color: red;">Mandatory</span></p></th>"#.to_string()
    } else {
        format!("<th><p><strong>{}</strong></p></th>", escape(label))
    }
}

fn body_cell(value: &str, highlighted: bool) -> String {
    if highlighted {
        format!(
            r#"<td><p><span style="background-color: {}; padding: 2px 4px;">{}</span></p></td>"#,
            level_style(value),
            escape(value)
        )
    } else {
        format!("<td><p>{}</p></td>", escape(value))
    }
}

/// One change table; an empty group renders a placeholder paragraph
pub fn render_change_table(table: &Table, highlight_columns: &[String]) -> String {
    if table.rows.is_empty() {
        return NO_DATA.to_string();
    }
    let highlighted: Vec<bool> = table
        .headers
        .iter()
        .map(|h| highlight_columns.iter().any(|c| c == h))
        .collect();

    let mut html = String::from(r#"<table data-layout="default">"#);
    html.push_str("<thead><tr>");
    for header in &table.headers {
        html.push_str(&header_cell(header));
    }
    html.push_str("</tr></thead><tbody>");
    for row in &table.rows {
        html.push_str("<tr>");
        for (index, value) in row.iter().enumerate() {
            html.push_str(&body_cell(value, highlighted.get(index).copied().unwrap_or(false)));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

/// Saturday of the week `date` falls in; Sunday rolls over to the next one
pub fn saturday_of_week(date: NaiveDate) -> NaiveDate {
    let offset = (5 - i64::from(date.weekday().num_days_from_monday())).rem_euclid(7);
    date + Duration::days(offset)
}

pub fn change_title(date: NaiveDate) -> String {
    format!("Weekend Change Note - {}", saturday_of_week(date).format("%Y-%m-%d"))
}

pub struct ChangePageRenderer {
    template_engine: Tera,
}

impl ChangePageRenderer {
    pub fn new() -> Result<Self> {
        let mut template_engine = Tera::default();
        template_engine.add_raw_templates(vec![
            ("changes.html", HTML_TEMPLATE),
            ("changes.xml", STORAGE_TEMPLATE),
        ])?;
        Ok(Self { template_engine })
    }

    pub fn render(&self, page: &ChangePage, format: ChangeFormat) -> Result<String> {
        let template = match format {
            ChangeFormat::Html => "changes.html",
            ChangeFormat::Storage => "changes.xml",
        };
        let mut context = Context::new();
        context.insert("page", page);
        Ok(self.template_engine.render(template, &context)?)
    }
}

pub fn build_page(groups: &ChangeGroups, settings: &ChangeSettings, date: NaiveDate) -> ChangePage {
    ChangePage {
        title: change_title(date),
        call_out_count: groups.call_out.rows.len(),
        call_out_table: render_change_table(&groups.call_out, &settings.highlight_columns),
        standard_count: groups.standard.rows.len(),
        standard_table: render_change_table(&groups.standard, &settings.highlight_columns),
    }
}

/// Read the export, split it and write the summary page
pub fn run(settings: &ChangeSettings, date: NaiveDate) -> Result<ChangeRunSummary> {
    let table = csv_io::read_table_file(&settings.input)?;
    info!(
        "Loaded {} changes from {}",
        table.rows.len(),
        settings.input.display()
    );
    check_columns(&table, &settings.required_columns)?;
    let groups = split_by_tag(&table, &settings.tag_column, &settings.call_out_tag)?;

    let page = build_page(&groups, settings, date);
    let content = ChangePageRenderer::new()?.render(&page, settings.format)?;
    write_page(&settings.output, &content)?;
    info!("Change summary written to {}", settings.output.display());

    Ok(ChangeRunSummary {
        title: page.title,
        call_out: page.call_out_count,
        standard: page.standard_count,
    })
}

fn write_page(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| common::write_failed(path, e))
}

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{{ page.title }}</title>
</head>
<body style="font-family:Arial,sans-serif;font-size:13px;color:#202020">
    <h1 style="font-size:18px">{{ page.title }}</h1>
    <h2>Weekend Change Summary</h2>
    <h3>Critical Changes (Call Out Required)</h3>
    {% if page.call_out_count > 0 %}
    {{ page.call_out_table | safe }}
    {% else %}
    <p>No critical changes requiring call out.</p>
    {% endif %}
    {% if page.standard_count > 0 %}
    <details>
        <summary>Standard Changes ({{ page.standard_count }})</summary>
        {{ page.standard_table | safe }}
    </details>
    {% else %}
    <p>No standard changes scheduled.</p>
    {% endif %}
</body>
</html>
"#;

const STORAGE_TEMPLATE: &str = r#"<h2>Weekend Change Summary</h2>
<h3>Critical Changes (Call Out Required)</h3>
{% if page.call_out_count > 0 %}{{ page.call_out_table | safe }}{% else %}<p>No critical changes requiring call out.</p>{% endif %}
{% if page.standard_count > 0 %}<ac:structured-macro ac:name="expand" ac:schema-version="1">
<ac:parameter ac:name="title">Standard Changes</ac:parameter>
<ac:rich-text-body>
{{ page.standard_table | safe }}
</ac:rich-text-body>
</ac:structured-macro>{% else %}<p>No standard changes scheduled.</p>{% endif %}
"#;
