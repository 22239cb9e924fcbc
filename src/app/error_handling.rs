//! Error handling utilities
//!
//! Turns the error that ended a run into a message and a process exit code.

use tracing::error;

use crate::error::PipelineError;

/// Exit code for an error, by category when it is a [`PipelineError`]
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<PipelineError>()
        .map(PipelineError::exit_code)
        .unwrap_or(1)
}

/// Handle fatal errors and exit with appropriate status code
///
/// - `verbose = 0`: User-friendly messages only
/// - `verbose >= 1`: Includes the full cause chain
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {}", error);

    if let Some(pipeline_err) = error.downcast_ref::<PipelineError>() {
        eprintln!("{}", pipeline_err.user_message());

        if verbose >= 1 {
            eprintln!("\nContext Chain:\n{}", pipeline_err.developer_message());
        }
    } else {
        eprintln!("Error: {error}");

        if verbose >= 1 {
            eprintln!("\nError chain:");
            for (i, cause) in error.chain().enumerate() {
                eprintln!("  {}: {}", i, cause);
            }
        }
    }

    std::process::exit(exit_code_for(&error))
}
