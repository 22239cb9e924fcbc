//! Turning ticket tables into categorized HTML reports and recipient lists

pub mod aggregate;
pub mod categorize;
pub mod changes;
pub mod contacts;
pub mod csv_io;
pub mod document;
pub mod emails;
pub mod fetch;
pub mod generator;
pub mod record;
pub mod render;
pub mod table_extract;

pub use aggregate::{aggregate, AggregateRow, AggregateTable, Severity};
pub use categorize::{categorize, BucketRules, Buckets, ParseFailure, WindowBucket};
pub use changes::{ChangeGroups, ChangePage, ChangePageRenderer, ChangeRunSummary};
pub use contacts::{ContactBook, EnrichStats};
pub use csv_io::Table;
pub use emails::{extract_emails, EmailList};
pub use fetch::{process_report_file, ExtractSummary, FetchOutcome, ReportFetcher};
pub use generator::{GeneratedReport, ReportGenerator, RunSummary};
pub use record::{load_records, Record, RecordSet, RowOutcome, SkippedRow};
pub use render::render_table;
