//! CLI argument structures

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{ChangeFormat, Overrides};

/// Log in to the ticketing service and build categorized ticket reports
#[derive(Parser, Debug)]
#[command(name = "snow-report")]
#[command(about = "snow-report - SSO session replay and ticket report generation", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (default: snow-report.toml in the working directory)
    #[arg(short = 'c', long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Proxy username (overrides SNOW_PROXY_USER)
    #[arg(long, global = true)]
    pub proxy_user: Option<String>,

    /// Proxy password (overrides SNOW_PROXY_PASS)
    #[arg(long, global = true)]
    pub proxy_pass: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Turn a CSV export into an HTML report and a recipient list
    #[command(name = "report")]
    Report {
        /// Input CSV file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// HTML report to write
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Recipient list to write
        #[arg(short, long)]
        emails: Option<PathBuf>,

        /// Reference time as RFC 3339 (default: now)
        #[arg(long, value_name = "TIMESTAMP")]
        now: Option<String>,
    },

    /// Split a change export into call-out and standard changes
    #[command(name = "changes")]
    Changes {
        /// Change export CSV
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Summary page to write
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Page markup
        #[arg(long, value_enum)]
        format: Option<ChangeFormat>,

        /// Any day of the change week as YYYY-MM-DD (default: today)
        #[arg(long, value_name = "DATE")]
        date: Option<NaiveDate>,
    },

    /// Log in and download every configured report
    #[command(name = "fetch")]
    Fetch {
        /// Contact mapping CSV used to fill owners and emails
        #[arg(long)]
        contacts: Option<PathBuf>,
    },

    /// Extract the table of a downloaded report JSON into CSV
    #[command(name = "extract")]
    Extract {
        /// Report JSON file
        #[arg(long)]
        json: PathBuf,

        /// CSV file to write
        #[arg(long)]
        csv: PathBuf,

        /// Contact mapping CSV used to fill owners and emails
        #[arg(long)]
        contacts: Option<PathBuf>,
    },

    /// Build or decode SAML 2.0 AuthnRequest values
    #[command(name = "saml-request")]
    SamlRequest {
        #[command(subcommand)]
        command: SamlRequestCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum SamlRequestCommands {
    /// Print a redirect-binding SAMLRequest value
    Encode {
        /// Service provider entity id
        #[arg(long)]
        issuer: String,

        /// Assertion consumer service URL
        #[arg(long)]
        acs_url: String,

        /// Identity provider SSO endpoint
        #[arg(long)]
        destination: String,

        /// Print the XML too
        #[arg(long)]
        show_xml: bool,
    },
    /// Print the XML inside a SAMLRequest value or redirect URL
    Decode {
        value: String,
    },
}

impl Cli {
    /// Command line values that take precedence over file and environment
    pub fn overrides(&self) -> Overrides {
        let mut overrides = Overrides {
            proxy_user: self.proxy_user.clone(),
            proxy_pass: self.proxy_pass.clone(),
            ..Default::default()
        };
        match &self.command {
            Commands::Report {
                input,
                output,
                emails,
                ..
            } => {
                overrides.input = input.clone();
                overrides.output = output.clone();
                overrides.emails_output = emails.clone();
            }
            Commands::Changes {
                input,
                output,
                format,
                ..
            } => {
                overrides.changes_input = input.clone();
                overrides.changes_output = output.clone();
                overrides.changes_format = *format;
            }
            Commands::Fetch { contacts } | Commands::Extract { contacts, .. } => {
                overrides.contacts_file = contacts.clone();
            }
            Commands::SamlRequest { .. } => {}
        }
        overrides
    }
}
