use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use super::{ChangeFormat, PipelineConfig, ReportDefinition, DEFAULT_CONFIG_FILE};
use crate::error::{common, PipelineError, Result};

const ENV_PREFIX: &str = "SNOW_";
const REDACTED: &str = "********";

/// Snapshot of the `SNOW_*` environment taken once at startup
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars()
                .filter(|(k, _)| k.starts_with(ENV_PREFIX))
                .collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of a variable, treating empty strings as unset
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Values given on the command line; they win over every other source
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub proxy_user: Option<String>,
    pub proxy_pass: Option<String>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub emails_output: Option<PathBuf>,
    pub contacts_file: Option<PathBuf>,
    pub changes_input: Option<PathBuf>,
    pub changes_output: Option<PathBuf>,
    pub changes_format: Option<ChangeFormat>,
}

pub struct ConfigLoader {
    env: EnvSnapshot,
    file: Option<PathBuf>,
    search_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(env: EnvSnapshot) -> Self {
        Self {
            env,
            file: None,
            search_dir: PathBuf::from("."),
        }
    }

    /// Use an explicit configuration file; it must exist
    pub fn with_file(mut self, path: Option<PathBuf>) -> Self {
        self.file = path;
        self
    }

    /// Directory searched for `snow-report.toml` when no file is given
    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dir = dir.into();
        self
    }

    pub fn load(&self, overrides: &Overrides) -> Result<PipelineConfig> {
        let mut config = match self.config_file()? {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                load_file(&path)?
            }
            None => {
                debug!("No configuration file found, using defaults");
                PipelineConfig::default()
            }
        };

        self.apply_env(&mut config)?;
        apply_overrides(&mut config, overrides);
        Ok(config)
    }

    fn config_file(&self) -> Result<Option<PathBuf>> {
        match &self.file {
            Some(path) if path.is_file() => Ok(Some(path.clone())),
            Some(path) => Err(common::config_not_found(path)),
            None => {
                let candidate = self.search_dir.join(DEFAULT_CONFIG_FILE);
                Ok(candidate.is_file().then_some(candidate))
            }
        }
    }

    fn apply_env(&self, config: &mut PipelineConfig) -> Result<()> {
        let env = &self.env;

        if let Some(v) = env.get("SNOW_USER_EMAIL") {
            config.sso.username = Some(v.to_string());
        }
        if let Some(v) = env.get("SNOW_USER_PASS") {
            config.sso.password = Some(v.to_string());
        }
        if let Some(v) = env.get("SNOW_HOMEPAGE_URL") {
            config.sso.homepage_url = Some(v.to_string());
        }
        if let Some(v) = env.get("SNOW_SAML_ACS_URL") {
            config.sso.saml_acs_url = Some(v.to_string());
        }
        if let Some(v) = env.get("SNOW_PROXY_HOST") {
            config.network.proxy_host = Some(v.to_string());
        }
        if let Some(v) = env.get("SNOW_PROXY_PORT") {
            let port = v.parse::<u16>().map_err(|_| {
                common::invalid_setting(
                    "SNOW_PROXY_PORT",
                    format!("'{}' is not a port number", v),
                )
            })?;
            config.network.proxy_port = Some(port);
        }
        if let Some(v) = env.get("SNOW_PROXY_USER") {
            config.network.proxy_user = Some(v.to_string());
        }
        if let Some(v) = env.get("SNOW_PROXY_PASS") {
            config.network.proxy_pass = Some(v.to_string());
        }
        if let Some(v) = env.get("SNOW_SSL_VERIFY") {
            config.network.ssl_verify = parse_bool(v)
                .ok_or_else(|| common::invalid_setting("SNOW_SSL_VERIFY", "expected true or false"))?;
        }

        let reports = self.env_reports();
        if !reports.is_empty() {
            if !config.reports.is_empty() {
                info!(
                    "SNOW_REPORT* variables replace {} report(s) from the configuration file",
                    config.reports.len()
                );
            }
            config.reports = reports;
        }
        Ok(())
    }

    /// Reports numbered from 1; numbering stops at the first index without
    /// a URL
    fn env_reports(&self) -> Vec<ReportDefinition> {
        let mut reports = Vec::new();
        for index in 1.. {
            let key = |field: &str| format!("SNOW_REPORT{}_{}", index, field);
            let Some(url) = self.env.get(&key("URL")) else {
                break;
            };
            let name = self
                .env
                .get(&key("NAME"))
                .map(str::to_string)
                .unwrap_or_else(|| format!("report{}", index));
            let output_json = self
                .env
                .get(&key("OUTPUT_JSON"))
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(format!("{}.json", name)));
            let output_csv = self
                .env
                .get(&key("OUTPUT_CSV"))
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(format!("{}.csv", name)));
            reports.push(ReportDefinition {
                name,
                url: url.to_string(),
                payload: self.env.get(&key("PAYLOAD")).map(str::to_string),
                output_json,
                output_csv,
            });
        }
        reports
    }
}

fn load_file(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::config(format!("Cannot read {}", path.display())).with_source(e)
    })?;
    toml::from_str(&content)
        .map_err(|e| PipelineError::from(e).with_context(path.display()))
}

fn apply_overrides(config: &mut PipelineConfig, overrides: &Overrides) {
    if let Some(v) = &overrides.proxy_user {
        config.network.proxy_user = Some(v.clone());
    }
    if let Some(v) = &overrides.proxy_pass {
        config.network.proxy_pass = Some(v.clone());
    }
    if let Some(v) = &overrides.input {
        config.report.input = v.clone();
    }
    if let Some(v) = &overrides.output {
        config.report.output = v.clone();
    }
    if let Some(v) = &overrides.emails_output {
        config.report.emails_output = v.clone();
    }
    if let Some(v) = &overrides.contacts_file {
        config.report.contacts_file = Some(v.clone());
    }
    if let Some(v) = &overrides.changes_input {
        config.changes.input = v.clone();
    }
    if let Some(v) = &overrides.changes_output {
        config.changes.output = v.clone();
    }
    if let Some(v) = overrides.changes_format {
        config.changes.format = v;
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn redact(value: Option<&str>) -> String {
    match value {
        Some(_) => REDACTED.to_string(),
        None => "<unset>".to_string(),
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if duration.subsec_nanos() != 0 {
        format!("{}ms", duration.as_millis())
    } else if secs > 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs > 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

fn show(value: Option<&str>) -> String {
    value.unwrap_or("<unset>").to_string()
}

/// Every recognized option with its effective value; secrets are masked
pub fn describe(config: &PipelineConfig) -> Vec<(String, String)> {
    let sso = &config.sso;
    let network = &config.network;
    let retry = &config.retry;
    let report = &config.report;
    let changes = &config.changes;

    let mut options = vec![
        ("sso.homepage_url".to_string(), show(sso.homepage_url.as_deref())),
        ("sso.idp_base_url".to_string(), sso.idp_base_url.clone()),
        ("sso.saml_acs_url".to_string(), show(sso.saml_acs_url.as_deref())),
        ("sso.username".to_string(), show(sso.username.as_deref())),
        ("sso.password".to_string(), redact(sso.password.as_deref())),
        ("sso.max_steps".to_string(), sso.max_steps.to_string()),
        ("network.proxy_host".to_string(), show(network.proxy_host.as_deref())),
        (
            "network.proxy_port".to_string(),
            network
                .proxy_port
                .map(|p| p.to_string())
                .unwrap_or_else(|| "<unset>".to_string()),
        ),
        ("network.proxy_user".to_string(), show(network.proxy_user.as_deref())),
        ("network.proxy_pass".to_string(), redact(network.proxy_pass.as_deref())),
        ("network.ssl_verify".to_string(), network.ssl_verify.to_string()),
        (
            "network.timeout".to_string(),
            format_duration(network.timeout),
        ),
        ("retry.max_attempts".to_string(), retry.max_attempts.to_string()),
        (
            "retry.default_wait".to_string(),
            format_duration(retry.default_wait),
        ),
        (
            "retry.status_waits".to_string(),
            retry
                .status_waits
                .iter()
                .map(|(code, wait)| {
                    format!(
                        "{}={}",
                        code,
                        format_duration(**wait)
                    )
                })
                .collect::<Vec<_>>()
                .join(","),
        ),
        ("report.input".to_string(), report.input.display().to_string()),
        ("report.output".to_string(), report.output.display().to_string()),
        (
            "report.emails_output".to_string(),
            report.emails_output.display().to_string(),
        ),
        ("report.columns.owner".to_string(), report.columns.owner.clone()),
        ("report.columns.severity".to_string(), report.columns.severity.clone()),
        ("report.columns.timestamp".to_string(), report.columns.timestamp.clone()),
        ("report.columns.reference".to_string(), report.columns.reference.clone()),
        ("report.timestamp_formats".to_string(), report.timestamp_formats.join(" | ")),
        ("report.display_format".to_string(), report.display_format.clone()),
        (
            "report.windows".to_string(),
            report
                .windows
                .iter()
                .map(|d| format!("{}d", d))
                .collect::<Vec<_>>()
                .join(","),
        ),
        ("report.email_fields".to_string(), report.email_fields.join(",")),
        ("report.email_separator".to_string(), report.email_separator.clone()),
        ("report.null_sentinels".to_string(), report.null_sentinels.join(",")),
        ("report.row_policy".to_string(), format!("{:?}", report.row_policy).to_lowercase()),
        ("report.title".to_string(), report.title.clone()),
        (
            "report.contacts_file".to_string(),
            report
                .contacts_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<unset>".to_string()),
        ),
        (
            "report.report_delay".to_string(),
            format_duration(report.report_delay),
        ),
        ("changes.input".to_string(), changes.input.display().to_string()),
        ("changes.output".to_string(), changes.output.display().to_string()),
        ("changes.required_columns".to_string(), changes.required_columns.join(",")),
        ("changes.tag_column".to_string(), changes.tag_column.clone()),
        ("changes.call_out_tag".to_string(), changes.call_out_tag.clone()),
        ("changes.highlight_columns".to_string(), changes.highlight_columns.join(",")),
        ("changes.format".to_string(), changes.format.as_str().to_string()),
    ];

    for (index, def) in config.reports.iter().enumerate() {
        options.push((format!("reports[{}].name", index), def.name.clone()));
        options.push((format!("reports[{}].url", index), def.url.clone()));
        options.push((
            format!("reports[{}].payload", index),
            if def.payload.is_some() { "<set>" } else { "<unset>" }.to_string(),
        ));
        options.push((
            format!("reports[{}].output_json", index),
            def.output_json.display().to_string(),
        ));
        options.push((
            format!("reports[{}].output_csv", index),
            def.output_csv.display().to_string(),
        ));
    }

    options
}

/// Log the effective configuration at the start of a run
pub fn log_options(config: &PipelineConfig) {
    info!("Effective configuration:");
    for (key, value) in describe(config) {
        info!("  {} = {}", key, value);
    }
}
