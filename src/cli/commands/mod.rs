//! Command implementation modules

pub mod changes;
pub mod extract;
pub mod fetch;
pub mod report;
pub mod saml_request;

pub use changes::run_changes_command;
pub use extract::run_extract_command;
pub use fetch::run_fetch_command;
pub use report::run_report_command;
pub use saml_request::run_saml_request_command;

use tracing::warn;

use crate::config::PipelineConfig;
use crate::report::ContactBook;

/// Contact book from the configured mapping file. A missing or unreadable
/// file only disables enrichment.
pub(crate) fn load_contacts(config: &PipelineConfig) -> Option<ContactBook> {
    let path = config.report.contacts_file.as_ref()?;
    match ContactBook::load(path) {
        Ok(book) => Some(book),
        Err(e) => {
            warn!("Contact enrichment disabled: {}", e.user_message());
            None
        }
    }
}
