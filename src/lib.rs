//! # snow-report
//!
//! Replays a browser's SAML single sign-on against a ticketing service and
//! turns the service's ticket data into categorized HTML reports.
//!
//! ## Usage
//!
//! ```bash
//! snow-report report --input report.csv --output report.html
//! snow-report fetch -c snow-report.toml
//! ```
//!
//! ## Modules
//!
//! - `app` - Process setup: verbosity, logging, fatal error reporting
//! - `cli` - Argument parsing and command handlers
//! - `config` - Layered configuration (TOML file, `SNOW_*` environment, flags)
//! - `dates` - Timestamp parsing and display
//! - `error` - Error type, error codes and exit codes
//! - `http` - Transport abstraction, cookie-carrying session, test double
//! - `report` - Record parsing, bucketing, aggregation, HTML and CSV output
//! - `retry` - Retry with per-status backoff
//! - `sso` - The scripted login against the identity provider
pub mod app;
pub mod cli;
pub mod config;
pub mod dates;
pub mod error;
pub mod http;
pub mod report;
pub mod retry;
pub mod sso;
