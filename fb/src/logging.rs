//! Tracing setup shared by both binaries
//!
//! Logs go to stderr unless a file is configured; stdout carries only the
//! supervisor's progress lines.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use eyre::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn filter(verbose: bool) -> EnvFilter {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    EnvFilter::from_default_env().add_directive(level.into())
}

/// Install the global subscriber
pub fn setup_logging(verbose: bool, file: Option<&Path>) -> Result<()> {
    match file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir).context("Failed to create log directory")?;
            }
            let log_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .context(format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_writer(Mutex::new(log_file))
                .with_ansi(false)
                .with_env_filter(filter(verbose))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter(verbose))
                .init();
        }
    }

    info!(pid = std::process::id(), "Logging initialized (verbose: {})", verbose);
    Ok(())
}
