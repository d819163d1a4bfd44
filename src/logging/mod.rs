// Logging module - tracing subscriber setup
//
// Console output goes to stdout for the server and to stderr for client
// commands (so `snapshot` can print clean JSON). File logging is optional,
// JSON-formatted, rotated by tracing-appender and written off-thread.
//
// Precedence: RUST_LOG env var > config file > default "info"

use crate::config::{LogRotation, LoggingConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Where human-readable log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleTarget {
    Stdout,
    Stderr,
}

/// Default filter directive for a configured level
pub fn default_filter(level: &str) -> String {
    format!("dad_dashboard={level},tower_http=info,axum=info")
}

/// Install the global subscriber
///
/// The returned guard must be held for the lifetime of the program so the
/// non-blocking file writer flushes on exit.
pub fn init(config: &LoggingConfig, console: ConsoleTarget) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(&config.level).into());

    let (file_layer, guard) = match file_writer(config) {
        Some((writer, guard)) => (
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_ansi(false),
            ),
            Some(guard),
        ),
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    match console {
        ConsoleTarget::Stdout => registry.with(tracing_subscriber::fmt::layer()).init(),
        ConsoleTarget::Stderr => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }

    guard
}

/// Rolling file appender wrapped in a non-blocking writer, if enabled
fn file_writer(
    config: &LoggingConfig,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    if !config.file_enabled {
        return None;
    }

    if let Err(e) = std::fs::create_dir_all(&config.file_dir) {
        // Subscriber isn't installed yet
        eprintln!(
            "Warning: Could not create log directory {:?}: {}",
            config.file_dir, e
        );
        return None;
    }

    let appender = match config.file_rotation {
        LogRotation::Hourly => {
            tracing_appender::rolling::hourly(&config.file_dir, &config.file_prefix)
        }
        LogRotation::Daily => tracing_appender::rolling::daily(&config.file_dir, &config.file_prefix),
        LogRotation::Never => tracing_appender::rolling::never(&config.file_dir, &config.file_prefix),
    };

    Some(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_targets_crate() {
        let filter = default_filter("debug");
        assert!(filter.starts_with("dad_dashboard=debug"));
        assert!(EnvFilter::try_new(&filter).is_ok());
    }

    #[test]
    fn test_file_writer_disabled_by_default() {
        assert!(file_writer(&LoggingConfig::default()).is_none());
    }

    #[test]
    fn test_file_writer_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            file_enabled: true,
            file_dir: dir.path().join("nested"),
            file_rotation: LogRotation::Never,
            ..LoggingConfig::default()
        };
        let writer = file_writer(&config);
        assert!(writer.is_some());
        assert!(dir.path().join("nested").is_dir());
    }
}
