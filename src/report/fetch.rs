//! Downloading configured reports through an authenticated session

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::contacts::{self, ContactBook, EnrichStats};
use super::csv_io;
use super::table_extract;
use crate::config::ReportDefinition;
use crate::error::{common, PipelineError, Result};
use crate::http::{HttpRequest, Session};
use crate::retry::{Sleeper, TokioSleeper};

const REPORT_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";
const REPORT_ACCEPT: &str = "application/json, text/plain, */*";

/// Result of turning one report JSON into CSV
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    pub csv_path: PathBuf,
    pub rows: usize,
    pub enrichment: Option<EnrichStats>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub name: String,
    pub json_path: PathBuf,
    pub extract: ExtractSummary,
}

/// Extract the first widget table of a report, enrich it when a contact book
/// is given, and write it as CSV. Enrichment problems only warn.
pub fn process_report(
    report: &Value,
    csv_path: &Path,
    contacts: Option<&ContactBook>,
) -> Result<ExtractSummary> {
    let mut table = table_extract::table_from_report(report)?;

    let enrichment = match contacts {
        Some(book) => match contacts::enrich(&mut table, book) {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("Contact enrichment skipped: {}", e.user_message());
                None
            }
        },
        None => None,
    };

    csv_io::write_table_file(csv_path, &table)?;
    info!("Wrote {} rows to {}", table.rows.len(), csv_path.display());
    Ok(ExtractSummary {
        csv_path: csv_path.to_path_buf(),
        rows: table.rows.len(),
        enrichment,
    })
}

/// [`process_report`] for a JSON file already on disk
pub fn process_report_file(
    json_path: &Path,
    csv_path: &Path,
    contacts: Option<&ContactBook>,
) -> Result<ExtractSummary> {
    let content = std::fs::read_to_string(json_path).map_err(|e| common::read_failed(json_path, e))?;
    let report: Value = serde_json::from_str(&content)
        .map_err(|e| PipelineError::from(e).with_path(json_path))?;
    process_report(&report, csv_path, contacts)
}

/// Fetches reports one after another with a fixed pause in between
pub struct ReportFetcher<'a> {
    session: &'a Session,
    contacts: Option<ContactBook>,
    delay: std::time::Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl<'a> ReportFetcher<'a> {
    pub fn new(session: &'a Session, delay: std::time::Duration) -> Self {
        Self {
            session,
            contacts: None,
            delay,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_contacts(mut self, contacts: Option<ContactBook>) -> Self {
        self.contacts = contacts;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    fn request(&self, definition: &ReportDefinition) -> HttpRequest {
        let mut request = HttpRequest::post(&definition.url)
            .header("Accept", REPORT_ACCEPT)
            .header("Referer", &definition.url)
            .header("X-Requested-With", "XMLHttpRequest")
            .raw(
                REPORT_CONTENT_TYPE,
                definition.payload.clone().unwrap_or_default(),
            );
        match self.session.user_token() {
            Some(token) => request = request.header("X-UserToken", token),
            None => warn!("No user token available; requesting {} without it", definition.name),
        }
        request
    }

    pub async fn fetch(&self, definition: &ReportDefinition) -> Result<FetchOutcome> {
        info!("Fetching {} from {}", definition.name, definition.url);
        let response = self
            .session
            .send_checked(&definition.name, self.request(definition))
            .await?;

        let report = match response.json() {
            Ok(report) => report,
            Err(e) => {
                let raw_path = definition.output_json.with_extension("txt");
                std::fs::write(&raw_path, &response.body)
                    .map_err(|io| common::write_failed(&raw_path, io))?;
                warn!(
                    "{} is not JSON; raw body saved to {}",
                    definition.name,
                    raw_path.display()
                );
                return Err(e.with_context(&definition.name));
            }
        };

        let pretty = serde_json::to_string_pretty(&report)?;
        std::fs::write(&definition.output_json, pretty)
            .map_err(|e| common::write_failed(&definition.output_json, e))?;
        info!("Saved {} to {}", definition.name, definition.output_json.display());

        let extract = process_report(&report, &definition.output_csv, self.contacts.as_ref())?;
        Ok(FetchOutcome {
            name: definition.name.clone(),
            json_path: definition.output_json.clone(),
            extract,
        })
    }

    /// Fetch every report. A failure does not stop the remaining reports, but
    /// the first failure is returned once all have been tried.
    pub async fn fetch_all(&self, definitions: &[ReportDefinition]) -> Result<Vec<FetchOutcome>> {
        let mut outcomes = Vec::new();
        let mut failures: Vec<(String, PipelineError)> = Vec::new();

        for (i, definition) in definitions.iter().enumerate() {
            info!(
                "Report {}/{}: {}",
                i + 1,
                definitions.len(),
                definition.name
            );
            match self.fetch(definition).await {
                Ok(outcome) => {
                    info!("{} completed", definition.name);
                    outcomes.push(outcome);
                }
                Err(e) => {
                    error!("{} failed: {}", definition.name, e);
                    failures.push((definition.name.clone(), e));
                }
            }
            if i + 1 < definitions.len() {
                self.sleeper.sleep(self.delay).await;
            }
        }

        info!(
            "Reports: {} succeeded, {} failed",
            outcomes.len(),
            failures.len()
        );
        let failed = failures.len();
        match failures.into_iter().next() {
            None => Ok(outcomes),
            Some((name, e)) => Err(e.with_context(format!(
                "{} of {} reports failed, first was '{}'",
                failed,
                definitions.len(),
                name
            ))),
        }
    }
}
