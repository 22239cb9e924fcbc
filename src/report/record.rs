use std::collections::BTreeMap;
use tracing::warn;

use super::csv_io::Table;
use crate::config::{ReportSettings, RowPolicy};
use crate::error::{common, ErrorCode, PipelineError, Result};

/// One validated data row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based data row index (the header is row 0)
    pub row: usize,
    pub owner: String,
    pub severity: String,
    /// Raw timestamp text; parsed during categorization
    pub timestamp: String,
    /// `None` when empty or a null sentinel
    pub reference: Option<String>,
    /// Every column of the row by header name
    pub fields: BTreeMap<String, String>,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// What happened to one input row
#[derive(Debug)]
pub enum RowOutcome {
    Parsed(Record),
    Skipped { row: usize, error: PipelineError },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    pub row: usize,
    pub reason: String,
}

/// Records of one input plus the rows that were left out
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    pub records: Vec<Record>,
    pub skipped: Vec<SkippedRow>,
    /// Data rows read, valid or not
    pub rows_processed: usize,
}

/// Validate one row. Missing or empty owner, severity or timestamp skips the
/// row.
pub fn parse_row(row: usize, fields: BTreeMap<String, String>, settings: &ReportSettings) -> RowOutcome {
    let columns = &settings.columns;
    let required = |name: &str| -> std::result::Result<String, PipelineError> {
        fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| common::missing_required_field(name).with_row(row))
    };

    let parsed = (|| {
        Ok::<_, PipelineError>((
            required(&columns.owner)?,
            required(&columns.severity)?,
            required(&columns.timestamp)?,
        ))
    })();

    match parsed {
        Ok((owner, severity, timestamp)) => {
            let reference = fields
                .get(&columns.reference)
                .map(|v| v.trim())
                .filter(|v| !settings.is_null_sentinel(v))
                .map(str::to_string);
            RowOutcome::Parsed(Record {
                row,
                owner,
                severity,
                timestamp,
                reference,
                fields,
            })
        }
        Err(error) => RowOutcome::Skipped { row, error },
    }
}

/// Turn a table into records under the configured row policy
pub fn load_records(table: &Table, settings: &ReportSettings) -> Result<RecordSet> {
    let columns = &settings.columns;
    for name in [&columns.owner, &columns.severity, &columns.timestamp] {
        if table.column(name).is_none() {
            return Err(PipelineError::validation_with_code(
                ErrorCode::VALIDATION_MISSING_COLUMN,
                format!(
                    "input has no '{}' column (found: {})",
                    name,
                    table.headers.join(", ")
                ),
                Some(name.clone()),
            ));
        }
    }
    if table.column(&columns.reference).is_none() {
        warn!(
            "Input has no '{}' column; every record counts as unspecified",
            columns.reference
        );
    }

    let mut set = RecordSet::default();
    for (index, values) in table.rows.iter().enumerate() {
        let row = index + 1;
        set.rows_processed += 1;
        let fields = table
            .headers
            .iter()
            .cloned()
            .zip(values.iter().cloned().chain(std::iter::repeat(String::new())))
            .collect();

        match parse_row(row, fields, settings) {
            RowOutcome::Parsed(record) => set.records.push(record),
            RowOutcome::Skipped { error, .. } if settings.row_policy == RowPolicy::Abort => {
                return Err(error.with_context("row policy is abort"));
            }
            RowOutcome::Skipped { row, error } => {
                warn!("Skipping row {}: {}", row, error.user_message());
                set.skipped.push(SkippedRow {
                    row,
                    reason: error.user_message(),
                });
            }
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::csv_io;

    const INPUT: &str = "Number,Assignment group,Impact,Due date,Email\n\
        INC1,Network,1 - High,2024-01-01,a@x.com\n\
        ,Storage,Low,2024-01-02,\n\
        INC3,,Low,2024-01-03,\n\
        INC4,Database,Medium,,\n\
        null,Database,Medium,2024-01-05\n";

    #[test]
    fn test_skip_policy_keeps_valid_rows() {
        let table = csv_io::parse(INPUT).unwrap();
        let set = load_records(&table, &ReportSettings::default()).unwrap();

        assert_eq!(set.rows_processed, 5);
        assert_eq!(set.records.len(), 3);
        assert_eq!(
            set.skipped.iter().map(|s| s.row).collect::<Vec<_>>(),
            vec![3, 4]
        );
        assert!(set.skipped[0].reason.contains("Assignment group"));

        assert_eq!(set.records[0].reference.as_deref(), Some("INC1"));
        assert_eq!(set.records[1].reference, None);
        assert_eq!(set.records[2].reference, None);
        assert_eq!(set.records[2].field("Email"), Some(""));
    }

    #[test]
    fn test_abort_policy_fails_on_first_invalid_row() {
        let table = csv_io::parse(INPUT).unwrap();
        let settings = ReportSettings {
            row_policy: RowPolicy::Abort,
            ..Default::default()
        };
        let err = load_records(&table, &settings).unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert!(err.user_message().contains("row 3"));
    }

    #[test]
    fn test_missing_required_column() {
        let table = csv_io::parse("Number,Impact\nINC1,Low\n").unwrap();
        let err = load_records(&table, &ReportSettings::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::VALIDATION_MISSING_COLUMN);
    }
}
