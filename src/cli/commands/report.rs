use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::config::PipelineConfig;
use crate::error::common;
use crate::report::ReportGenerator;

fn reference_time(now: Option<&str>) -> crate::error::Result<DateTime<Utc>> {
    match now {
        None => Ok(Utc::now()),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                common::invalid_setting("--now", format!("'{}' is not an RFC 3339 timestamp", raw))
                    .with_source(e)
            }),
    }
}

/// CSV in, HTML report and recipient list out
pub fn run_report_command(config: &PipelineConfig, now: Option<&str>) -> Result<()> {
    config.validate_for_report()?;
    let now = reference_time(now)?;
    let settings = &config.report;

    let summary = ReportGenerator::new(settings)?.run(
        &settings.input,
        &settings.output,
        &settings.emails_output,
        now,
    )?;

    println!(
        "Report written to {} ({} rows, {} skipped, {} unparseable timestamps)",
        settings.output.display(),
        summary.rows_processed,
        summary.skipped.len(),
        summary.parse_errors.len()
    );
    println!(
        "{} recipients written to {}",
        summary.emails,
        settings.emails_output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_time() {
        let t = reference_time(Some("2024-06-01T12:00:00+02:00")).unwrap();
        assert_eq!(t.to_rfc3339(), "2024-06-01T10:00:00+00:00");

        let err = reference_time(Some("tomorrow")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
