//! Pipeline configuration
//!
//! One [`PipelineConfig`] is built per run by [`ConfigLoader`] from, in
//! increasing precedence: built-in defaults, a TOML file, `SNOW_*`
//! environment variables and command-line flags. It is passed by reference
//! into every component; nothing reads the environment after loading.

pub mod loader;

pub use loader::{ConfigLoader, EnvSnapshot, Overrides};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::dates;
use crate::error::{common, Result};
use crate::retry::RetryPolicy;
use crate::sso::Credential;

pub const DEFAULT_CONFIG_FILE: &str = "snow-report.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct PipelineConfig {
    pub sso: SsoConfig,
    pub network: NetworkConfig,
    pub retry: RetryConfig,
    pub reports: Vec<ReportDefinition>,
    pub report: ReportSettings,
    pub changes: ChangeSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SsoConfig {
    /// Protected page of the ticketing service that starts the login
    #[serde(default)]
    pub homepage_url: Option<String>,
    #[serde(default = "default_idp_base_url")]
    pub idp_base_url: String,
    /// Assertion consumer used when the assertion form has no action
    #[serde(default)]
    pub saml_acs_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    /// Only ever set from the environment or the command line
    #[serde(skip)]
    pub password: Option<String>,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SsoConfig {
    fn default() -> Self {
        Self {
            homepage_url: None,
            idp_base_url: default_idp_base_url(),
            saml_acs_url: None,
            username: None,
            password: None,
            max_steps: default_max_steps(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    #[serde(default)]
    pub proxy_host: Option<String>,
    #[serde(default)]
    pub proxy_port: Option<u16>,
    #[serde(default)]
    pub proxy_user: Option<String>,
    #[serde(skip)]
    pub proxy_pass: Option<String>,
    #[serde(default = "default_true")]
    pub ssl_verify: bool,
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy_host: None,
            proxy_port: None,
            proxy_user: None,
            proxy_pass: None,
            ssl_verify: true,
            timeout: default_timeout(),
        }
    }
}

impl NetworkConfig {
    /// Proxy URL without credentials, if a proxy is configured
    pub fn proxy_url(&self) -> Option<String> {
        let host = self.proxy_host.as_deref()?.trim();
        if host.is_empty() {
            return None;
        }
        let base = if host.contains("://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };
        match self.proxy_port {
            Some(port) if !host.rsplit(':').next().is_some_and(|p| p.parse::<u16>().is_ok()) => {
                Some(format!("{}:{}", base.trim_end_matches('/'), port))
            }
            _ => Some(base),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(with = "humantime_serde", default = "default_wait")]
    pub default_wait: Duration,
    /// HTTP status code (as written in the file) to wait
    #[serde(default = "default_status_waits")]
    pub status_waits: BTreeMap<String, humantime_serde::Serde<Duration>>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            default_wait: default_wait(),
            status_waits: default_status_waits(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> Result<RetryPolicy> {
        let mut policy = RetryPolicy::none()
            .with_max_attempts(self.max_attempts)
            .with_default_wait(self.default_wait);
        for (status, wait) in &self.status_waits {
            let code: u16 = status
                .trim()
                .parse()
                .ok()
                .filter(|c| (100..600).contains(c))
                .ok_or_else(|| {
                    common::invalid_setting(
                        "retry.status_waits",
                        format!("'{}' is not an HTTP status code", status),
                    )
                })?;
            policy = policy.with_status_wait(code, **wait);
        }
        Ok(policy)
    }
}

/// One report fetched from the service by the `fetch` command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ReportDefinition {
    pub name: String,
    pub url: String,
    /// Form-encoded body sent with the report request
    #[serde(default)]
    pub payload: Option<String>,
    pub output_json: PathBuf,
    pub output_csv: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RowPolicy {
    /// Log the invalid row and continue
    #[default]
    Skip,
    /// Fail the whole run on the first invalid row
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ColumnNames {
    #[serde(default = "default_owner_column")]
    pub owner: String,
    #[serde(default = "default_severity_column")]
    pub severity: String,
    #[serde(default = "default_timestamp_column")]
    pub timestamp: String,
    #[serde(default = "default_reference_column")]
    pub reference: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            owner: default_owner_column(),
            severity: default_severity_column(),
            timestamp: default_timestamp_column(),
            reference: default_reference_column(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ReportSettings {
    #[serde(default = "default_input")]
    pub input: PathBuf,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default = "default_emails_output")]
    pub emails_output: PathBuf,
    #[serde(default)]
    pub columns: ColumnNames,
    #[serde(default = "dates::default_timestamp_formats")]
    pub timestamp_formats: Vec<String>,
    #[serde(default = "dates::default_display_format")]
    pub display_format: String,
    /// Upper bounds, in days from now, of the "due soon" buckets
    #[serde(default = "default_windows")]
    pub windows: Vec<u32>,
    #[serde(default = "default_email_fields")]
    pub email_fields: Vec<String>,
    #[serde(default = "default_email_separator")]
    pub email_separator: String,
    #[serde(default = "default_null_sentinels")]
    pub null_sentinels: Vec<String>,
    #[serde(default)]
    pub row_policy: RowPolicy,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub contacts_file: Option<PathBuf>,
    #[serde(with = "humantime_serde", default = "default_report_delay")]
    pub report_delay: Duration,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            input: default_input(),
            output: default_output(),
            emails_output: default_emails_output(),
            columns: ColumnNames::default(),
            timestamp_formats: dates::default_timestamp_formats(),
            display_format: dates::default_display_format(),
            windows: default_windows(),
            email_fields: default_email_fields(),
            email_separator: default_email_separator(),
            null_sentinels: default_null_sentinels(),
            row_policy: RowPolicy::default(),
            title: default_title(),
            contacts_file: None,
            report_delay: default_report_delay(),
        }
    }
}

impl ReportSettings {
    pub fn is_null_sentinel(&self, value: &str) -> bool {
        let value = value.trim();
        value.is_empty()
            || self
                .null_sentinels
                .iter()
                .any(|s| s.eq_ignore_ascii_case(value))
    }
}

/// Markup of the change summary page
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFormat {
    /// Standalone HTML page with a `<details>` block for standard changes
    #[default]
    Html,
    /// Wiki storage format body with an expand macro
    Storage,
}

impl ChangeFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeFormat::Html => "html",
            ChangeFormat::Storage => "storage",
        }
    }
}

/// Settings of the `changes` command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ChangeSettings {
    #[serde(default = "default_changes_input")]
    pub input: PathBuf,
    #[serde(default = "default_changes_output")]
    pub output: PathBuf,
    #[serde(default = "default_required_change_columns")]
    pub required_columns: Vec<String>,
    /// Column holding the tag; dropped from the rendered tables
    #[serde(default = "default_tag_column")]
    pub tag_column: String,
    /// Tag value, after trimming, that puts a change in the call-out table
    #[serde(default = "default_call_out_tag")]
    pub call_out_tag: String,
    /// Columns whose cells get a red, amber or green background
    #[serde(default = "default_highlight_columns")]
    pub highlight_columns: Vec<String>,
    #[serde(default)]
    pub format: ChangeFormat,
}

impl Default for ChangeSettings {
    fn default() -> Self {
        Self {
            input: default_changes_input(),
            output: default_changes_output(),
            required_columns: default_required_change_columns(),
            tag_column: default_tag_column(),
            call_out_tag: default_call_out_tag(),
            highlight_columns: default_highlight_columns(),
            format: ChangeFormat::default(),
        }
    }
}

impl PipelineConfig {
    /// Login credential assembled from the configured username and the
    /// password taken from the environment or command line
    pub fn credential(&self) -> Result<Credential> {
        let username = self
            .sso
            .username
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| common::missing_setting("sso.username", "set SNOW_USER_EMAIL"))?;
        let password = self
            .sso
            .password
            .clone()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| common::missing_setting("sso.password", "set SNOW_USER_PASS"))?;
        Ok(Credential::new(username, password))
    }

    /// Checks shared by every command
    pub fn validate_common(&self) -> Result<()> {
        let settings = &self.report;
        if settings.timestamp_formats.is_empty() {
            return Err(common::invalid_setting(
                "report.timestamp_formats",
                "at least one timestamp format is required",
            ));
        }
        if let Some(bad) = settings
            .timestamp_formats
            .iter()
            .find(|f| !dates::is_valid_format(f))
        {
            return Err(common::invalid_setting(
                "report.timestamp_formats",
                format!("'{}' is not a valid date format", bad),
            ));
        }
        if !dates::is_valid_format(&settings.display_format) {
            return Err(common::invalid_setting(
                "report.display_format",
                format!("'{}' is not a valid date format", settings.display_format),
            ));
        }
        if settings.windows.contains(&0) || settings.windows.windows(2).any(|w| w[0] >= w[1]) {
            return Err(common::invalid_setting(
                "report.windows",
                "windows must be positive and strictly increasing",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(common::invalid_setting(
                "retry.max_attempts",
                "at least one attempt is required",
            ));
        }
        self.retry.policy()?;
        Ok(())
    }

    /// Checks for the CSV to HTML report path
    pub fn validate_for_report(&self) -> Result<()> {
        self.validate_common()?;
        let settings = &self.report;
        let columns = &settings.columns;
        for (key, value) in [
            ("report.columns.owner", &columns.owner),
            ("report.columns.severity", &columns.severity),
            ("report.columns.timestamp", &columns.timestamp),
        ] {
            if value.trim().is_empty() {
                return Err(common::invalid_setting(key, "column name must not be empty"));
            }
        }
        if settings.email_separator.is_empty() {
            return Err(common::invalid_setting(
                "report.email_separator",
                "separator must not be empty",
            ));
        }
        Ok(())
    }

    /// Checks for the change summary path
    pub fn validate_for_changes(&self) -> Result<()> {
        let settings = &self.changes;
        if settings.tag_column.trim().is_empty() {
            return Err(common::invalid_setting(
                "changes.tag_column",
                "column name must not be empty",
            ));
        }
        if settings.call_out_tag.trim().is_empty() {
            return Err(common::invalid_setting(
                "changes.call_out_tag",
                "tag must not be empty",
            ));
        }
        if settings.required_columns.iter().any(|c| c.trim().is_empty()) {
            return Err(common::invalid_setting(
                "changes.required_columns",
                "column names must not be empty",
            ));
        }
        Ok(())
    }

    /// Checks for commands that talk to the service. Runs before any
    /// network call.
    pub fn validate_for_fetch(&self) -> Result<()> {
        self.validate_common()?;

        let homepage = self.sso.homepage_url.as_deref().ok_or_else(|| {
            common::missing_setting("sso.homepage_url", "set SNOW_HOMEPAGE_URL")
        })?;
        check_url("sso.homepage_url", homepage)?;
        check_url("sso.idp_base_url", &self.sso.idp_base_url)?;
        if let Some(acs) = &self.sso.saml_acs_url {
            check_url("sso.saml_acs_url", acs)?;
        }
        if self.sso.max_steps == 0 {
            return Err(common::invalid_setting(
                "sso.max_steps",
                "at least one step is required",
            ));
        }
        self.credential()?;

        if let Some(proxy) = self.network.proxy_url() {
            check_url("network.proxy_host", &proxy)?;
            if self.network.proxy_user.is_some() && self.network.proxy_pass.is_none() {
                return Err(common::missing_setting(
                    "network.proxy_pass",
                    "set SNOW_PROXY_PASS or --proxy-pass",
                ));
            }
        }

        if self.reports.is_empty() {
            return Err(common::missing_setting(
                "reports",
                "add a [[reports]] table or SNOW_REPORT1_* variables",
            ));
        }
        for (index, report) in self.reports.iter().enumerate() {
            let key = format!("reports[{}].url", index);
            check_url(&key, &report.url)?;
            if report.name.trim().is_empty() {
                return Err(common::invalid_setting(
                    &format!("reports[{}].name", index),
                    "report name must not be empty",
                ));
            }
        }
        Ok(())
    }
}

fn check_url(key: &str, value: &str) -> Result<()> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(url) => Err(common::invalid_setting(
            key,
            format!("unsupported URL scheme '{}'", url.scheme()),
        )),
        Err(e) => Err(common::invalid_setting(
            key,
            format!("'{}' is not a valid URL: {}", value, e),
        )),
    }
}

fn default_idp_base_url() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_max_steps() -> u32 {
    20
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_wait() -> Duration {
    Duration::from_secs(5)
}

fn default_status_waits() -> BTreeMap<String, humantime_serde::Serde<Duration>> {
    RetryPolicy::default()
        .status_waits
        .into_iter()
        .map(|(code, wait)| (code.to_string(), wait.into()))
        .collect()
}

fn default_owner_column() -> String {
    "Assignment group".to_string()
}

fn default_severity_column() -> String {
    "Impact".to_string()
}

fn default_timestamp_column() -> String {
    "Due date".to_string()
}

fn default_reference_column() -> String {
    "Number".to_string()
}

fn default_input() -> PathBuf {
    PathBuf::from("report.csv")
}

fn default_output() -> PathBuf {
    PathBuf::from("report.html")
}

fn default_emails_output() -> PathBuf {
    PathBuf::from("emails.txt")
}

fn default_windows() -> Vec<u32> {
    vec![10, 30]
}

fn default_email_fields() -> Vec<String> {
    vec!["Email".to_string()]
}

fn default_email_separator() -> String {
    ";".to_string()
}

fn default_null_sentinels() -> Vec<String> {
    vec!["null".to_string(), "none".to_string(), "n/a".to_string()]
}

fn default_title() -> String {
    "Open items by assignment group".to_string()
}

fn default_report_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_changes_input() -> PathBuf {
    PathBuf::from("extracted_output.csv")
}

fn default_changes_output() -> PathBuf {
    PathBuf::from("change-summary.html")
}

fn default_required_change_columns() -> Vec<String> {
    ["Change ID", "Summary", "Assignee", "Impact", "Risk", "Date", "Tags"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_tag_column() -> String {
    "Tags".to_string()
}

fn default_call_out_tag() -> String {
    "Call_out".to_string()
}

fn default_highlight_columns() -> Vec<String> {
    vec!["Impact".to_string(), "Risk".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn fetch_ready() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.sso.homepage_url = Some("https://svc.example.com/nav_to.do".to_string());
        config.sso.username = Some("user@example.com".to_string());
        config.sso.password = Some("secret".to_string());
        config.reports.push(ReportDefinition {
            name: "open".to_string(),
            url: "https://svc.example.com/api/now/report".to_string(),
            payload: None,
            output_json: PathBuf::from("open.json"),
            output_csv: PathBuf::from("open.csv"),
        });
        config
    }

    #[test]
    fn test_defaults_validate_for_report() {
        let config = PipelineConfig::default();
        assert!(config.validate_for_report().is_ok());
        assert_eq!(config.report.windows, vec![10, 30]);
        assert_eq!(config.report.row_policy, RowPolicy::Skip);
        assert!(config.network.ssl_verify);
    }

    #[test]
    fn test_fetch_requires_homepage_and_password() {
        let config = PipelineConfig::default();
        let err = config.validate_for_fetch().unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_MISSING_REQUIRED);
        assert_eq!(err.exit_code(), 2);

        let mut config = fetch_ready();
        assert!(config.validate_for_fetch().is_ok());
        config.sso.password = None;
        assert!(config
            .validate_for_fetch()
            .unwrap_err()
            .user_message()
            .contains("sso.password"));
    }

    #[test]
    fn test_windows_must_increase() {
        let mut config = PipelineConfig::default();
        config.report.windows = vec![30, 10];
        assert!(config.validate_for_report().is_err());
        config.report.windows = vec![0, 10];
        assert!(config.validate_for_report().is_err());
    }

    #[test]
    fn test_status_waits_must_be_status_codes() {
        let mut config = PipelineConfig::default();
        config
            .retry
            .status_waits
            .insert("soon".to_string(), Duration::from_secs(1).into());
        let err = config.validate_common().unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_INVALID_VALUE);
    }

    #[test]
    fn test_retry_policy_from_config() {
        let policy = RetryConfig::default().policy().unwrap();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.wait_for("HTTP 503"), Duration::from_secs(60));
    }

    #[test]
    fn test_proxy_url_forms() {
        let mut network = NetworkConfig::default();
        assert_eq!(network.proxy_url(), None);
        network.proxy_host = Some("proxy.corp".to_string());
        network.proxy_port = Some(8080);
        assert_eq!(network.proxy_url().as_deref(), Some("http://proxy.corp:8080"));
        network.proxy_host = Some("http://proxy.corp:3128".to_string());
        assert_eq!(network.proxy_url().as_deref(), Some("http://proxy.corp:3128"));
    }

    #[test]
    fn test_changes_section_from_toml() {
        let config: PipelineConfig = toml::from_str(
            r#"
[changes]
input = "weekend.csv"
call_out_tag = "Escalate"
format = "storage"
"#,
        )
        .unwrap();
        assert_eq!(config.changes.input, PathBuf::from("weekend.csv"));
        assert_eq!(config.changes.format, ChangeFormat::Storage);
        assert_eq!(config.changes.tag_column, "Tags");
        assert_eq!(config.changes.highlight_columns, vec!["Impact", "Risk"]);
        assert!(config.validate_for_changes().is_ok());

        let mut config = config;
        config.changes.call_out_tag = " ".to_string();
        let err = config.validate_for_changes().unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_INVALID_VALUE);
    }

    #[test]
    fn test_toml_rejects_unknown_keys() {
        let result: std::result::Result<PipelineConfig, _> =
            toml::from_str("[sso]\nhomepage = \"https://x\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_toml_durations_and_policy() {
        let config: PipelineConfig = toml::from_str(
            r#"
[network]
timeout = "45s"

[retry]
max_attempts = 5
status_waits = { "503" = "1m", "429" = "30s" }

[report]
row_policy = "abort"
windows = [7, 14, 28]
"#,
        )
        .unwrap();
        assert_eq!(config.network.timeout, Duration::from_secs(45));
        assert_eq!(config.report.row_policy, RowPolicy::Abort);
        let policy = config.retry.policy().unwrap();
        assert_eq!(policy.wait_for("HTTP 429"), Duration::from_secs(30));
        assert_eq!(policy.max_attempts, 5);
    }
}
