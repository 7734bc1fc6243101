//! Runtime configuration: worker concurrency, poll intervals, HTTP client
//! tuning — everything that is not per-repository and therefore does not
//! belong in `repositories.toml` (see [`deposit_config::RepositoryConfigRegistry`]).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;

const DEFAULT_WORKER_COUNT: usize = 8;
const DEFAULT_QUEUE_CAPACITY: usize = 256;
const DEFAULT_WORKER_SHUTDOWN_GRACE_MS: u64 = 10_000;
const DEFAULT_DEPOSIT_UPDATER_INTERVAL_MS: u64 = 60_000;
const DEFAULT_SUBMISSION_STATUS_UPDATER_INTERVAL_MS: u64 = 30_000;
const DEFAULT_FAILURE_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_READ_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_USER_AGENT: &str = "deposit-orchestrator/0.1";

/// On-disk runtime configuration document (`runtime.toml`). Every field has
/// a default so an empty file, or a file with only the fields an operator
/// cares to override, both parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub worker_shutdown_grace_ms: u64,
    pub deposit_updater_interval_ms: u64,
    pub submission_status_updater_interval_ms: u64,
    pub failure_channel_capacity: usize,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub user_agent: String,
    /// Where `repositories.toml` lives, relative to the working directory.
    pub repositories_config_path: PathBuf,
    /// Base directory for the filesystem-backed metadata store and
    /// transport adapters this binary ships with.
    pub data_dir: PathBuf,
    pub logging: LoggingConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            worker_shutdown_grace_ms: DEFAULT_WORKER_SHUTDOWN_GRACE_MS,
            deposit_updater_interval_ms: DEFAULT_DEPOSIT_UPDATER_INTERVAL_MS,
            submission_status_updater_interval_ms: DEFAULT_SUBMISSION_STATUS_UPDATER_INTERVAL_MS,
            failure_channel_capacity: DEFAULT_FAILURE_CHANNEL_CAPACITY,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            repositories_config_path: PathBuf::from("repositories.toml"),
            data_dir: PathBuf::from("./data"),
            logging: LoggingConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_parses_to_defaults() {
        let config: RuntimeConfig = toml::from_str("").unwrap();
        assert_eq!(config.worker_count, DEFAULT_WORKER_COUNT);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn partial_override_keeps_remaining_defaults() {
        let config: RuntimeConfig = toml::from_str("worker_count = 2\n").unwrap();
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }
}
