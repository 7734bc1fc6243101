//! `tracing-subscriber` initialization, driven by [`LoggingConfig`].

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Log output format: human-readable for a terminal, structured for a log
/// aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Pretty
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Default level filter, used when `RUST_LOG` is unset.
    pub default_level: String,
    /// Directory to additionally mirror logs to, non-blocking. `None`
    /// disables file output.
    pub file_dir: Option<String>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            default_level: "info".to_string(),
            file_dir: None,
            file_prefix: "deposit-orchestrator".to_string(),
        }
    }
}

/// Initializes the global `tracing` subscriber. Returns the file-appender
/// guard, if file logging was configured — the caller must keep it alive
/// for the lifetime of the process, or buffered lines are dropped on exit.
pub fn init(config: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.default_level.clone()));

    let guard = config.file_dir.as_ref().map(|dir| {
        let file_appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let builder = tracing_subscriber::fmt().with_env_filter(filter_for_file(&config.default_level)).with_writer(non_blocking);
        match config.format {
            LogFormat::Pretty => builder.init(),
            LogFormat::Json => builder.json().init(),
        }
        guard
    });

    if guard.is_none() {
        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        match config.format {
            LogFormat::Pretty => builder.init(),
            LogFormat::Json => builder.json().init(),
        }
    }

    guard
}

fn filter_for_file(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.to_string()))
}
