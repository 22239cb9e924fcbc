use anyhow::Result;
use chrono::{Local, NaiveDate};

use crate::config::PipelineConfig;
use crate::report::changes;

/// Change export in, weekend change summary page out
pub fn run_changes_command(config: &PipelineConfig, date: Option<NaiveDate>) -> Result<()> {
    config.validate_for_changes()?;
    let settings = &config.changes;
    let date = date.unwrap_or_else(|| Local::now().date_naive());

    let summary = changes::run(settings, date)?;

    println!(
        "{} written to {} ({} call-out, {} standard changes)",
        summary.title,
        settings.output.display(),
        summary.call_out,
        summary.standard
    );
    Ok(())
}
