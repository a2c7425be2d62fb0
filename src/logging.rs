//! Structured logging setup.
//!
//! Logs always go to stderr; stdout carries the JSON-RPC stream. With file logging
//! enabled they are also appended to `<log dir>/server.log`. If the log file cannot be
//! set up, logging continues on stderr only.
//!
//! The filter comes from `FMODATA_LOG`, then `RUST_LOG`, then [`default_log_filter`].

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Log file is `<prefix>.log` inside the log directory
pub const LOG_FILE_PREFIX: &str = "server";

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Directory for the log file
    pub log_dir: PathBuf,
    /// Also write to a file
    pub file_logging: bool,
    /// Optional custom log filter
    pub log_filter: Option<String>,
}

impl LogSettings {
    pub fn new(log_dir: PathBuf, file_logging: bool) -> Self {
        Self { log_dir, file_logging, log_filter: None }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }
}

/// Guard that must be held for the lifetime of the process.
///
/// Dropping this guard flushes pending file log entries.
pub struct LoggingGuard {
    _worker_guard: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// Calling this twice leaves the first subscriber in place.
pub fn init_logging(settings: &LogSettings) -> LoggingGuard {
    if !settings.file_logging {
        return init_stderr_logging(settings.log_filter.as_deref());
    }

    match init_file_logging(settings) {
        Ok(guard) => LoggingGuard { _worker_guard: Some(guard) },
        Err(e) => {
            let guard = init_stderr_logging(settings.log_filter.as_deref());
            tracing::warn!(error = %e, "Failed to initialize file logging, using stderr only");
            guard
        }
    }
}

fn init_stderr_logging(filter: Option<&str>) -> LoggingGuard {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(build_env_filter(filter))
        .with_ansi(false)
        .with_target(false)
        .try_init();

    LoggingGuard { _worker_guard: None }
}

fn init_file_logging(settings: &LogSettings) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&settings.log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(&settings.log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let combined = std::io::stderr.and(non_blocking);

    tracing_subscriber::fmt()
        .with_writer(combined)
        .with_env_filter(build_env_filter(settings.log_filter.as_deref()))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| e.to_string())?;

    Ok(guard)
}

/// Priority: custom filter > FMODATA_LOG > RUST_LOG > default
fn build_env_filter(custom_filter: Option<&str>) -> EnvFilter {
    if let Some(filter) = custom_filter {
        return EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(default_log_filter()));
    }

    EnvFilter::try_from_env("FMODATA_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter()))
}

pub fn default_log_filter() -> &'static str {
    "fmodata=info,reqwest=warn,hyper=warn"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_filter_wins() {
        let filter = build_env_filter(Some("fmodata=trace"));
        assert_eq!(filter.to_string(), "fmodata=trace");
    }

    #[test]
    fn test_invalid_custom_filter_falls_back() {
        let filter = build_env_filter(Some("fmodata=notalevel"));
        assert!(filter.to_string().contains("fmodata=info"));
    }

    #[test]
    fn test_settings_builder() {
        let settings = LogSettings::new(PathBuf::from("/tmp/logs"), true).with_filter("debug");
        assert!(settings.file_logging);
        assert_eq!(settings.log_filter.as_deref(), Some("debug"));
    }
}
