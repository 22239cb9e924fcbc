use anyhow::Result;
use tracing::info;

use super::load_contacts;
use crate::config::PipelineConfig;
use crate::http::production_session;
use crate::report::ReportFetcher;
use crate::sso::{AcquirerSettings, SessionAcquirer};

/// Log in, then download and post-process every configured report
pub async fn run_fetch_command(config: &PipelineConfig) -> Result<()> {
    config.validate_for_fetch()?;
    let credential = config.credential()?;
    let contacts = load_contacts(config);

    let acquirer = SessionAcquirer::new(AcquirerSettings::from_config(&config.sso)?);
    let session = acquirer
        .acquire(production_session(config)?, &credential)
        .await?;
    info!("Authenticated as {}", credential.username());

    let outcomes = ReportFetcher::new(&session, config.report.report_delay)
        .with_contacts(contacts)
        .fetch_all(&config.reports)
        .await?;

    for outcome in &outcomes {
        println!(
            "{}: {} -> {} ({} rows)",
            outcome.name,
            outcome.json_path.display(),
            outcome.extract.csv_path.display(),
            outcome.extract.rows
        );
    }
    Ok(())
}
