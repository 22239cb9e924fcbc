use clap::Parser;
use tracing::trace;

use snow_report::app::{handle_fatal_error, init_logging, AppConfig};
use snow_report::cli::{execute_command, Cli};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    let app = match AppConfig::new(verbose) {
        Ok(app) => app,
        Err(e) => handle_fatal_error(e, verbose),
    };
    init_logging(&app);
    trace!("Parsed arguments: {:?}", cli.command);

    if let Err(e) = execute_command(cli, &app).await {
        handle_fatal_error(e, verbose);
    }
}
