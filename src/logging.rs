//! Tracing subscriber setup.
//!
//! The TUI owns the terminal in raw mode, so interactive runs log to a file.
//! Headless runs log to stderr.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_FILE_NAME: &str = "deduplifhir.log";

/// Where log output goes.
#[derive(Debug, Clone)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Default log file under the application data directory.
pub fn default_log_file(user_data_dir: &Path) -> PathBuf {
    user_data_dir.join("logs").join(LOG_FILE_NAME)
}

fn filter(debug: bool, verbose: bool) -> EnvFilter {
    if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

pub fn init(target: &LogTarget, debug: bool, verbose: bool) -> Result<()> {
    let filter = filter(debug, verbose);
    match target {
        LogTarget::Stderr => {
            fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
    }
    Ok(())
}
