//! Tracing setup for Dropbin
//!
//! Console logs at a user-chosen level, plus an optional full-trace log file
//! for post-mortem debugging.

use std::fs::{File, create_dir_all};
use std::path::Path;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::DropbinError;

/// Name of the per-run debug log inside the logs directory.
pub const LOG_FILE_NAME: &str = "dropbin-last-run.log";

/// Initialize tracing with console output and an optional debug file.
///
/// # Arguments
/// * `console_level` - Log level for console output, unless `RUST_LOG` is set
/// * `logs_dir` - Directory for `dropbin-last-run.log`; no file is written when `None`
///
/// # Errors
///
/// - `DropbinError::Io` - If the logs directory or file cannot be created
/// - `DropbinError::Configuration` - If a global subscriber is already installed
pub fn init_tracing(console_level: Level, logs_dir: Option<&Path>) -> crate::Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(console_filter);

    let log_file_path = logs_dir.map(|dir| dir.join(LOG_FILE_NAME));
    let file_layer = match (logs_dir, &log_file_path) {
        (Some(dir), Some(path)) => {
            create_dir_all(dir)?;
            let log_file = File::create(path)?;

            // File layer always captures everything at TRACE level
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false)
                    .with_writer(log_file)
                    .with_filter(EnvFilter::new("trace")),
            )
        }
        _ => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| DropbinError::Configuration {
            reason: format!("tracing already initialized: {e}"),
        })?;

    match log_file_path {
        Some(path) => tracing::info!(
            "Tracing initialized: console={}, debug_file={}",
            console_level,
            path.display()
        ),
        None => tracing::info!("Tracing initialized: console={}", console_level),
    }

    Ok(())
}

/// CLI log levels for user control
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Informational, warning, and error messages
    Info,
    /// Debug, informational, warning, and error messages
    Debug,
    /// All messages including detailed tracing
    Trace,
}

impl CliLogLevel {
    /// Converts CLI log level to tracing Level enum.
    ///
    /// # Examples
    /// ```
    /// use dropbin_core::tracing_setup::CliLogLevel;
    ///
    /// let level = CliLogLevel::Info.as_tracing_level();
    /// assert_eq!(level, tracing::Level::INFO);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliLogLevel::Error => write!(f, "error"),
            CliLogLevel::Warn => write!(f, "warn"),
            CliLogLevel::Info => write!(f, "info"),
            CliLogLevel::Debug => write!(f, "debug"),
            CliLogLevel::Trace => write!(f, "trace"),
        }
    }
}
