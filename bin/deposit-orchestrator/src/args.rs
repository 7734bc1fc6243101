//! Command-line arguments for the deposit orchestrator binary.
//!
//! Values given here override the matching field loaded from
//! `runtime.toml`; the rest of [`ResolvedConfig`] passes the file's value
//! straight through.

use std::path::PathBuf;

use argh::FromArgs;
use deposit_primitives::ResourceId;

use crate::config::RuntimeConfig;
use crate::logging::LoggingConfig;

/// Orchestrates manuscript deposits to external repositories.
#[derive(Debug, FromArgs)]
pub struct Args {
    /// path to the runtime configuration TOML file
    #[argh(option, short = 'c', description = "runtime config path")]
    pub config: Option<PathBuf>,

    /// override the configured worker pool size
    #[argh(option, description = "worker pool size")]
    pub worker_count: Option<usize>,

    /// override the configured repositories.toml path
    #[argh(option, description = "repositories.toml path")]
    pub repositories_config_path: Option<PathBuf>,

    /// override the configured data directory for the filesystem adapters
    #[argh(option, short = 'd', description = "data directory")]
    pub data_dir: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs, PartialEq)]
#[argh(subcommand)]
pub enum Command {
    ProcessSubmission(ProcessSubmission),
    UpdateDeposits(UpdateDeposits),
    UpdateSubmissions(UpdateSubmissions),
    Serve(Serve),
}

/// Runs the submission processor (C6) once, for a single submission.
#[derive(Debug, FromArgs, PartialEq)]
#[argh(subcommand, name = "process-submission", description = "process one submission")]
pub struct ProcessSubmission {
    #[argh(option, description = "submission id")]
    pub id: String,
}

/// Runs one deposit-updater (C7) reconciliation pass, optionally scoped to
/// specific deposit ids.
#[derive(Debug, FromArgs, PartialEq)]
#[argh(subcommand, name = "update-deposits", description = "reconcile pending deposits")]
pub struct UpdateDeposits {
    #[argh(option, description = "deposit id (may be repeated); scans all pending deposits if omitted")]
    pub id: Vec<String>,
}

/// Runs one submission-status-updater (C8) reconciliation pass over every
/// active submission.
#[derive(Debug, FromArgs, PartialEq)]
#[argh(subcommand, name = "update-submissions", description = "recompute aggregated submission statuses")]
pub struct UpdateSubmissions {}

/// Runs the deposit updater and submission status updater as background
/// loops until terminated.
#[derive(Debug, FromArgs, PartialEq)]
#[argh(subcommand, name = "serve", description = "run the periodic reconcilers continuously")]
pub struct Serve {}

impl Args {
    /// Loads `runtime.toml` (or its defaults), then applies CLI overrides.
    pub fn resolve_config(&self) -> anyhow::Result<RuntimeConfig> {
        let mut config = match &self.config {
            Some(path) => RuntimeConfig::from_file(path)?,
            None => RuntimeConfig::default(),
        };

        if let Some(worker_count) = self.worker_count {
            config.worker_count = worker_count;
        }
        if let Some(path) = &self.repositories_config_path {
            config.repositories_config_path = path.clone();
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }

        Ok(config)
    }

    pub fn resolve_logging(&self, config: &RuntimeConfig) -> LoggingConfig {
        config.logging.clone()
    }
}

pub fn deposit_ids(raw: &[String]) -> Vec<ResourceId> {
    raw.iter().map(|id| ResourceId::from_str(id.clone())).collect()
}
