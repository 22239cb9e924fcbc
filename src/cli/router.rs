//! Command routing and execution

use anyhow::Result;

use crate::app::AppConfig;
use crate::cli::args::{Cli, Commands};
use crate::cli::commands::*;
use crate::config::{loader, ConfigLoader, EnvSnapshot, PipelineConfig};

/// Load configuration from file, environment and command line, then log it
pub fn load_config(cli: &Cli, app: &AppConfig) -> crate::error::Result<PipelineConfig> {
    let config = ConfigLoader::new(EnvSnapshot::from_process())
        .with_file(cli.config.clone())
        .with_search_dir(&app.working_dir)
        .load(&cli.overrides())?;
    loader::log_options(&config);
    Ok(config)
}

/// Execute a CLI command based on the parsed arguments
pub async fn execute_command(cli: Cli, app: &AppConfig) -> Result<()> {
    match &cli.command {
        Commands::Report { now, .. } => {
            let config = load_config(&cli, app)?;
            run_report_command(&config, now.as_deref())
        }
        Commands::Changes { date, .. } => {
            let config = load_config(&cli, app)?;
            run_changes_command(&config, *date)
        }
        Commands::Fetch { .. } => {
            let config = load_config(&cli, app)?;
            run_fetch_command(&config).await
        }
        Commands::Extract { json, csv, .. } => {
            let config = load_config(&cli, app)?;
            run_extract_command(&config, json, csv)
        }
        Commands::SamlRequest { command } => run_saml_request_command(command),
    }
}
