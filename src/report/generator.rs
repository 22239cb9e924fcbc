//! CSV in, HTML report and recipient list out

use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{info, warn};

use super::aggregate::aggregate;
use super::categorize::{categorize, BucketRules, ParseFailure};
use super::csv_io::{self, Table};
use super::document::{Document, DocumentRenderer, Section, SkippedNote};
use super::emails::{extract_emails, EmailList};
use super::record::{load_records, Record, SkippedRow};
use super::render::render_table;
use crate::config::ReportSettings;
use crate::dates;
use crate::error::{common, Result};

/// Counts reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub rows_processed: usize,
    pub skipped: Vec<SkippedRow>,
    pub parse_errors: Vec<ParseFailure>,
    pub overdue: usize,
    /// Label and record count per window
    pub windows: Vec<(String, usize)>,
    pub later: usize,
    pub unspecified_reference: usize,
    pub emails: usize,
}

impl RunSummary {
    pub fn log(&self) {
        info!(
            "Processed {} rows: {} skipped, {} unparseable timestamps",
            self.rows_processed,
            self.skipped.len(),
            self.parse_errors.len()
        );
        for skipped in &self.skipped {
            warn!("Skipped row {}: {}", skipped.row, skipped.reason);
        }
        info!("Overdue: {}", self.overdue);
        for (label, count) in &self.windows {
            info!("{}: {}", label, count);
        }
        info!("Later: {}", self.later);
        info!("Without reference: {}", self.unspecified_reference);
        info!("Recipients: {}", self.emails);
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub html: String,
    pub emails: EmailList,
    pub summary: RunSummary,
}

pub struct ReportGenerator<'a> {
    settings: &'a ReportSettings,
    renderer: DocumentRenderer,
}

impl<'a> ReportGenerator<'a> {
    pub fn new(settings: &'a ReportSettings) -> Result<Self> {
        Ok(Self {
            settings,
            renderer: DocumentRenderer::new()?,
        })
    }

    fn rules(&self) -> BucketRules {
        BucketRules::new(
            self.settings.windows.clone(),
            self.settings.timestamp_formats.clone(),
        )
    }

    fn section(&self, title: String, records: &[&Record]) -> Section {
        let table = if records.is_empty() {
            String::new()
        } else {
            render_table(&aggregate(records.iter().copied()), &title)
        };
        Section {
            title,
            count: records.len(),
            table,
        }
    }

    /// Build the report for an in-memory table
    pub fn generate(&self, table: &Table, now: DateTime<Utc>) -> Result<GeneratedReport> {
        let set = load_records(table, self.settings)?;
        let buckets = categorize(&set.records, now, &self.rules());

        let mut sections = vec![self.section("Overdue".to_string(), &buckets.overdue)];
        for window in &buckets.windows {
            sections.push(self.section(window.label(), &window.records));
        }
        sections.push(self.section("Due later".to_string(), &buckets.later));
        sections.push(self.section(
            "Without reference".to_string(),
            &buckets.unspecified_reference,
        ));

        let emails = extract_emails(&set.records, &self.settings.email_fields, |v| {
            self.settings.is_null_sentinel(v)
        });

        let summary = RunSummary {
            rows_processed: set.rows_processed,
            skipped: set.skipped.clone(),
            parse_errors: buckets.parse_errors.clone(),
            overdue: buckets.overdue.len(),
            windows: buckets
                .windows
                .iter()
                .map(|w| (w.label(), w.records.len()))
                .collect(),
            later: buckets.later.len(),
            unspecified_reference: buckets.unspecified_reference.len(),
            emails: emails.len(),
        };

        let document = Document {
            title: self.settings.title.clone(),
            generated_at: dates::format_timestamp(&now, &self.settings.display_format),
            rows_processed: summary.rows_processed,
            rows_skipped: summary.skipped.len(),
            parse_errors: summary.parse_errors.len(),
            skipped: set
                .skipped
                .iter()
                .map(|s| SkippedNote {
                    row: s.row,
                    reason: s.reason.clone(),
                })
                .collect(),
            sections,
        };
        let html = self.renderer.render(&document)?;

        Ok(GeneratedReport {
            html,
            emails,
            summary,
        })
    }

    /// Read the input CSV, write the HTML report and the recipient line
    pub fn run(&self, input: &Path, output: &Path, emails_output: &Path, now: DateTime<Utc>) -> Result<RunSummary> {
        info!("Reading {}", input.display());
        let table = csv_io::read_table_file(input)?;
        let report = self.generate(&table, now)?;

        std::fs::write(output, &report.html).map_err(|e| common::write_failed(output, e))?;
        info!("Wrote report to {}", output.display());

        let line = report.emails.join(&self.settings.email_separator);
        std::fs::write(emails_output, line).map_err(|e| common::write_failed(emails_output, e))?;
        info!(
            "Wrote {} recipients to {}",
            report.emails.len(),
            emails_output.display()
        );

        report.summary.log();
        Ok(report.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    const INPUT: &str = "Number,Assignment group,Impact,Due date,Email\n\
        INC1,Network,1 - High,2024-05-01,net@x.com\n\
        INC2,Network,3 - Low,2024-06-05,net@x.com\n\
        ,Storage,2 - Medium,2024-08-01,store@x.com;null\n";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_generate_summary() {
        let settings = ReportSettings::default();
        let table = csv_io::parse(INPUT).unwrap();
        let report = ReportGenerator::new(&settings)
            .unwrap()
            .generate(&table, now())
            .unwrap();

        assert_eq!(report.summary.rows_processed, 3);
        assert_eq!(report.summary.overdue, 1);
        assert_eq!(
            report.summary.windows,
            vec![
                ("Due in next 10 days".to_string(), 1),
                ("Due in next 30 days".to_string(), 0)
            ]
        );
        assert_eq!(report.summary.later, 1);
        assert_eq!(report.summary.unspecified_reference, 1);
        assert_eq!(report.emails.join(";"), "net@x.com;store@x.com");
        assert!(report.html.contains("Generated 2024-06-01 00:00 UTC"));
        assert!(report.html.contains("Due in next 30 days (0)"));
    }

    #[test]
    fn test_run_writes_outputs() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.csv");
        let output = dir.path().join("out.html");
        let emails = dir.path().join("emails.txt");
        std::fs::write(&input, INPUT).unwrap();

        let settings = ReportSettings::default();
        let summary = ReportGenerator::new(&settings)
            .unwrap()
            .run(&input, &output, &emails, now())
            .unwrap();

        assert_eq!(summary.emails, 2);
        assert!(std::fs::read_to_string(&output).unwrap().contains("<html>"));
        assert_eq!(
            std::fs::read_to_string(&emails).unwrap(),
            "net@x.com;store@x.com"
        );
    }
}
