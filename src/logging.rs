//! Subscriber setup for binaries. Library code only emits events.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "retention.log";

/// Keeps the non-blocking file writer alive; drop it only at process exit.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingOptions {
    /// `EnvFilter` directive, e.g. `info` or `retention_engine=debug`
    pub level: String,
    /// Daily rolling file directory; `None` logs to stdout only
    pub file_dir: Option<PathBuf>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_dir: None,
        }
    }
}

impl LoggingOptions {
    /// Reads `LOG_LEVEL`, `ENABLE_FILE_LOGS` (`true`/`1`) and `LOG_DIR`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let level = lookup("LOG_LEVEL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "info".to_string());
        let file_dir = lookup("ENABLE_FILE_LOGS")
            .filter(|v| v == "true" || v == "1")
            .map(|_| PathBuf::from(lookup("LOG_DIR").unwrap_or_else(|| "./logs".to_string())));
        Self { level, file_dir }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.level).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Installs the global subscriber. Returns the file guard when file logging is on.
///
/// A second call (or a subscriber installed elsewhere) is ignored.
pub fn init_tracing(options: &LoggingOptions) -> Option<FileLogGuard> {
    let stdout_layer = fmt::layer().with_target(false).compact();

    let (file_layer, guard) = match &options.file_dir {
        Some(dir) => match std::fs::create_dir_all(dir) {
            Ok(()) => {
                let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true)
                    .boxed();
                (Some(layer), Some(FileLogGuard { _guard: guard }))
            }
            Err(err) => {
                eprintln!("file logging disabled, cannot create {}: {err}", dir.display());
                (None, None)
            }
        },
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(options.filter())
        .with(stdout_layer)
        .with(file_layer)
        .try_init();
    if installed.is_err() {
        return None;
    }
    guard
}
