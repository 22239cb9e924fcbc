//! Application configuration
//!
//! Settings of the process itself, as opposed to [`crate::config::PipelineConfig`]
//! which describes the work to do.

use anyhow::Result;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Verbosity level for logging
    pub verbose: u8,
    /// Directory searched for the default configuration file
    pub working_dir: PathBuf,
}

impl AppConfig {
    pub fn new(verbose: u8) -> Result<Self> {
        let working_dir = std::env::current_dir()
            .map_err(|e| anyhow::anyhow!("Failed to get current directory: {}", e))?;

        Ok(Self {
            verbose,
            working_dir,
        })
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    /// Get the log filter based on verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            2 => "trace",
            _ => "trace,hyper=debug,reqwest=debug",
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            verbose: 0,
            working_dir: PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_follows_verbosity() {
        let levels: Vec<&str> = (0..4)
            .map(|verbose| AppConfig { verbose, ..Default::default() }.log_level())
            .collect();
        assert_eq!(levels[0], "info");
        assert_eq!(levels[1], "debug");
        assert_eq!(levels[2], "trace");
        assert!(levels[3].starts_with("trace,"));
    }
}
