use anyhow::Result;
use std::path::Path;

use super::load_contacts;
use crate::config::PipelineConfig;
use crate::report::process_report_file;

/// Post-process a report JSON that is already on disk
pub fn run_extract_command(config: &PipelineConfig, json: &Path, csv: &Path) -> Result<()> {
    config.validate_common()?;
    let contacts = load_contacts(config);

    let summary = process_report_file(json, csv, contacts.as_ref())?;
    match summary.enrichment {
        Some(stats) => println!(
            "{} rows written to {} ({} contacts found, {} not found)",
            summary.rows,
            summary.csv_path.display(),
            stats.found,
            stats.not_found
        ),
        None => println!("{} rows written to {}", summary.rows, summary.csv_path.display()),
    }
    Ok(())
}
