//! Assembles the library's pieces — [`PackagerResolver`], [`WorkerPool`],
//! [`FailureReporter`], [`SubmissionProcessor`], [`DepositUpdater`],
//! [`SubmissionStatusUpdater`] — from a resolved [`RuntimeConfig`] and a
//! loaded [`RepositoryConfigRegistry`].
//!
//! The collaborators registered here (`FsMetadataStore`, `FilesystemTransport`,
//! `ManifestAssembler`) are this binary's own dev-mode adapters, not the
//! production HTTP/SWORD/FTP clients — those live outside this workspace
//! (see `deposit-collaborators`'s crate doc comment).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use deposit_collaborators::{Assembler, MetadataStore, Transport};
use deposit_config::RepositoryConfigRegistry;
use deposit_core::{
    failure_channel, DefaultSubmissionPolicy, DepositUpdater, PackagerResolver, ProtocolKind, ReqwestStatusFetcher,
    StatusDocumentFetcher, SubmissionProcessor, SubmissionStatusUpdater, TransportRuntimeOptions, WorkerPool,
};
use deposit_primitives::ProtocolBinding;
use tokio::sync::mpsc;

use crate::config::RuntimeConfig;
use crate::fs_store::FsMetadataStore;
use crate::fs_transport::FilesystemTransport;
use crate::manifest_assembler::ManifestAssembler;

/// Everything a CLI subcommand needs to do its work, plus the background
/// failure handler task's receiver (consumed separately, since it is only
/// ever spawned once per process).
pub struct Wiring {
    pub store: Arc<dyn MetadataStore>,
    pub submission_processor: SubmissionProcessor,
    pub deposit_updater: DepositUpdater,
    pub submission_status_updater: SubmissionStatusUpdater,
    pub worker_pool: Arc<WorkerPool>,
    pub failure_rx: mpsc::Receiver<failure_channel::FailureEvent>,
    pub critical_locks: deposit_core::CriticalLocks,
    pub critical_config: deposit_core::CriticalConfig,
}

pub fn assemble(config: &RuntimeConfig) -> anyhow::Result<Wiring> {
    let raw = std::fs::read_to_string(&config.repositories_config_path)?;
    let registry = RepositoryConfigRegistry::from_toml(&raw)?;

    let mut assemblers: HashMap<String, Arc<dyn Assembler>> = HashMap::new();
    assemblers.insert("manifest".to_string(), Arc::new(ManifestAssembler));

    let mut transports: HashMap<ProtocolKind, Arc<dyn Transport>> = HashMap::new();
    transports.insert(ProtocolKind::Filesystem, Arc::new(FilesystemTransport));

    let runtime_options = TransportRuntimeOptions {
        connect_timeout_ms: config.connect_timeout_ms,
        read_timeout_ms: config.read_timeout_ms,
        user_agent: config.user_agent.clone(),
    };

    let packagers = PackagerResolver::new(registry.clone(), assemblers, transports, runtime_options);
    let config_registry = Arc::new(registry);

    let store: Arc<dyn MetadataStore> = Arc::new(FsMetadataStore::open(&config.data_dir)?);

    let status_fetcher: Arc<dyn StatusDocumentFetcher> = Arc::new(ReqwestStatusFetcher::new(
        &config.user_agent,
        Duration::from_millis(config.connect_timeout_ms),
        Duration::from_millis(config.read_timeout_ms),
    ));

    let critical_locks = deposit_core::CriticalLocks::new();
    let critical_config = deposit_core::CriticalConfig::default();

    let worker_pool = Arc::new(WorkerPool::new(
        config.worker_count,
        config.queue_capacity,
        Duration::from_millis(config.worker_shutdown_grace_ms),
    ));

    let (failure_tx, failure_rx) = failure_channel::channel(config.failure_channel_capacity);

    let submission_processor = SubmissionProcessor {
        store: store.clone(),
        locks: critical_locks.clone(),
        critical_config: critical_config.clone(),
        builder: Arc::new(ProjectingSubmissionBuilder),
        packagers,
        pool: worker_pool.clone(),
        failures: failure_tx.clone(),
        policy: Arc::new(DefaultSubmissionPolicy),
        status_fetcher: status_fetcher.clone(),
    };

    let deposit_updater = DepositUpdater {
        store: store.clone(),
        locks: critical_locks.clone(),
        critical_config: critical_config.clone(),
        config_registry,
        status_fetcher,
        interval: Duration::from_millis(config.deposit_updater_interval_ms),
    };

    let submission_status_updater = SubmissionStatusUpdater {
        store: store.clone(),
        locks: critical_locks.clone(),
        critical_config: critical_config.clone(),
        interval: Duration::from_millis(config.submission_status_updater_interval_ms),
    };

    Ok(Wiring {
        store,
        submission_processor,
        deposit_updater,
        submission_status_updater,
        worker_pool,
        failure_rx,
        critical_locks,
        critical_config,
    })
}

/// Projects a [`Submission`](deposit_primitives::Submission)'s own
/// `files`/`metadata`/persons straight into a `DepositSubmission`: this
/// binary has no manuscript/journal/article repository of its own to look
/// those up in, so the submission is its own projection.
#[derive(Debug, Default)]
struct ProjectingSubmissionBuilder;

#[async_trait::async_trait]
impl deposit_collaborators::DepositSubmissionBuilder for ProjectingSubmissionBuilder {
    async fn build(
        &self,
        submission: &deposit_primitives::Submission,
    ) -> Result<deposit_primitives::DepositSubmission, deposit_collaborators::BuildError> {
        let files = submission
            .files
            .iter()
            .map(|f| deposit_primitives::DepositFile {
                name: f.name.clone(),
                content_location: f.location.clone(),
                role: f.role.clone(),
            })
            .collect();

        Ok(deposit_primitives::DepositSubmission {
            submission_id: submission.id.clone(),
            files,
            persons: submission.metadata.persons.clone(),
            metadata: submission.metadata.clone(),
        })
    }
}
