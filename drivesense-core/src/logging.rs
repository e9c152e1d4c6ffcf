//! Logging for drivesense
//!
//! Everything goes to a daily file under the state directory
//! (`~/.local/state/drivesense/drivesense.YYYY-MM-DD.log`); stdout belongs to
//! command output. Watch mode polls every second, so the HTTP
//! stack is held at `warn` unless `RUST_LOG` asks for more, and only the
//! newest `max_files` days are kept.

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};

const FILE_PREFIX: &str = "drivesense";
const FILE_SUFFIX: &str = "log";

/// Crates that log every request at debug level.
const QUIET_DEPENDENCIES: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls"];

/// Start file logging. Keep the returned guard alive for the life of the
/// process; dropping it flushes buffered lines.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(FILE_PREFIX)
        .filename_suffix(FILE_SUFFIX)
        .max_log_files(config.max_files.max(1))
        .build(&log_dir)
        .map_err(|e| Error::Config(format!("failed to open log file: {}", e)))?;

    // Poll ticks log from runtime worker threads; writes happen off them.
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter(config))
        .with(file_layer)
        .init();

    tracing::info!(
        log_file = %log_file_path().display(),
        level = %config.level,
        max_files = config.max_files,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// `RUST_LOG` wins; otherwise the configured level with the HTTP stack
/// capped at `warn`.
fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(&config.level)))
}

fn directives(level: &str) -> String {
    let mut directives = vec![level.trim().to_string()];
    directives.extend(QUIET_DEPENDENCIES.iter().map(|krate| format!("{}=warn", krate)));
    directives.join(",")
}

/// Test output through the harness's captured writer.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Flushes pending log lines when dropped.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Today's log file.
pub fn log_file_path() -> PathBuf {
    Config::log_path()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_path_is_dated() {
        let path = log_file_path();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("drivesense."));
        assert!(name.ends_with(".log"));
        // drivesense.YYYY-MM-DD.log
        assert_eq!(name.len(), "drivesense.".len() + 10 + ".log".len());
        assert!(path.starts_with(Config::state_dir()));
    }

    #[test]
    fn test_directives_quiet_http_stack() {
        assert_eq!(
            directives(" debug "),
            "debug,hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn"
        );
    }
}
