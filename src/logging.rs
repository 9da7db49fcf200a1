//! Logging setup for the adaptive quality host.
//!
//! Configures tracing with JSON output to both stderr and a daily-rotated log
//! file under ~/.local/share/adaptive-quality/.

use std::path::PathBuf;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log directory name under the user's local data directory
const LOG_DIR: &str = "adaptive-quality";
/// Log file name prefix
const LOG_FILE_PREFIX: &str = "controller";
/// Maximum number of log files to retain
const MAX_LOG_FILES: usize = 3;
/// Timestamp format for every log line
const LOG_TIMESTAMP_FORMAT: Rfc3339 = Rfc3339;

/// Errors related to logging initialization.
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Could not determine the local data directory")]
    DataDirectoryNotFound,

    #[error("Failed to create log directory '{path}': {source}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create log file appender: {0}")]
    AppenderCreationFailed(String),
}

/// Guard that keeps the non-blocking writers alive.
/// Must be held for the lifetime of the application.
pub struct LogGuard {
    _file_guard: tracing_appender::non_blocking::WorkerGuard,
    _stderr_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Initialize the logging system with both stderr and file output.
///
/// The level defaults to `info` and can be overridden with `RUST_LOG`.
pub fn init_logging() -> Result<LogGuard, LoggingError> {
    let log_dir = log_directory()?;

    std::fs::create_dir_all(&log_dir).map_err(|e| LoggingError::DirectoryCreationFailed {
        path: log_dir.display().to_string(),
        source: e,
    })?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(&log_dir)
        .map_err(|e| LoggingError::AppenderCreationFailed(e.to_string()))?;

    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);
    let (non_blocking_stderr, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .json()
        .with_timer(UtcTime::new(LOG_TIMESTAMP_FORMAT))
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(non_blocking_file);

    let stderr_layer = fmt::layer()
        .json()
        .with_timer(UtcTime::new(LOG_TIMESTAMP_FORMAT))
        .with_current_span(true)
        .with_writer(non_blocking_stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(LogGuard {
        _file_guard: file_guard,
        _stderr_guard: stderr_guard,
    })
}

/// Log directory path (~/.local/share/adaptive-quality on Linux).
pub fn log_directory() -> Result<PathBuf, LoggingError> {
    dirs::data_local_dir()
        .map(|dir| dir.join(LOG_DIR))
        .ok_or(LoggingError::DataDirectoryNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directory() {
        if let Ok(path) = log_directory() {
            assert!(path.ends_with(LOG_DIR));
        }
    }

    #[test]
    fn test_timestamp_format_is_rfc_3339_utc() {
        let stamp = time::OffsetDateTime::UNIX_EPOCH
            .format(&LOG_TIMESTAMP_FORMAT)
            .unwrap();
        assert_eq!(stamp, "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = LoggingError::DirectoryCreationFailed {
            path: "/nope".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/nope"));
        assert!(msg.contains("denied"));
    }
}
