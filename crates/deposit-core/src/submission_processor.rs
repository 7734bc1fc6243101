use std::sync::Arc;

use deposit_collaborators::{DepositSubmissionBuilder, MetadataStore};
use deposit_primitives::{
    Deposit, DepositSubmission, IntegrationType, ResourceId, Submission, SubmissionStatus,
};
use tracing::{debug, error, instrument, warn};

use crate::critical::{perform, CriticalConfig, CriticalLocks};
use crate::errors::{CriticalOutcome, PoolRejected};
use crate::failure_channel::{FailureEvent, FailureReporter};
use crate::packager::PackagerResolver;
use crate::status_resolver::StatusDocumentFetcher;
use crate::task::{DepositTask, DepositWorkContext};
use crate::worker_pool::WorkerPool;

/// Decides whether a submission is eligible to be (re)processed. The
/// default policy (submitted and never yet started) is what C6's precheck
/// enforces in production; a caller reprocessing a submission for a
/// different reason (e.g. an administrative retrigger) can supply its own.
pub trait SubmissionPolicy: Send + Sync {
    fn accepts(&self, submission: &Submission) -> bool;
}

/// `submitted == true AND aggregatedStatus == NOT_STARTED`.
#[derive(Debug, Default)]
pub struct DefaultSubmissionPolicy;

impl SubmissionPolicy for DefaultSubmissionPolicy {
    fn accepts(&self, submission: &Submission) -> bool {
        submission.submitted && submission.aggregated_status == SubmissionStatus::NotStarted
    }
}

/// C6, §4.5: turns an accepted submission into one [`DepositTask`] per
/// linked repository (skipping `WEB_LINK` targets, which never transfer
/// anything).
pub struct SubmissionProcessor {
    pub store: Arc<dyn MetadataStore>,
    pub locks: CriticalLocks,
    pub critical_config: CriticalConfig,
    pub builder: Arc<dyn DepositSubmissionBuilder>,
    pub packagers: PackagerResolver,
    pub pool: Arc<WorkerPool>,
    pub failures: FailureReporter,
    pub policy: Arc<dyn SubmissionPolicy>,
    pub status_fetcher: Arc<dyn StatusDocumentFetcher>,
}

impl SubmissionProcessor {
    #[instrument(skip_all, fields(component = "submission_processor", submission_id = %submission_id))]
    pub async fn process(&self, submission_id: ResourceId) {
        let Some((repositories, projection)) = self.build_projection(submission_id.clone()).await else {
            return;
        };
        let projection = Arc::new(projection);

        for repository_id in repositories {
            self.dispatch_repository(submission_id.clone(), repository_id, projection.clone()).await;
        }
    }

    /// The submission-level critical interaction: precheck via
    /// [`SubmissionPolicy`], mutate by invoking the external builder and
    /// flipping `aggregatedStatus` to `IN_PROGRESS`, postcheck by
    /// validating the projection. Returns the submission's repository ids
    /// (captured before any later mutation) alongside the projection.
    async fn build_projection(&self, submission_id: ResourceId) -> Option<(Vec<ResourceId>, DepositSubmission)> {
        type Outcome = Option<(Vec<ResourceId>, DepositSubmission)>;

        let outcome = perform::<Submission, Outcome, _, _, _, _>(
            self.store.as_ref(),
            &self.locks,
            submission_id.clone(),
            |submission: &Submission| self.policy.accepts(submission),
            |submission: &mut Submission| {
                let builder = self.builder.clone();
                async move {
                    match builder.build(submission).await {
                        Ok(projection) => {
                            submission.aggregated_status = SubmissionStatus::InProgress;
                            Some((submission.repositories.clone(), projection))
                        }
                        Err(err) => {
                            warn!(error = %err, "deposit submission builder failed");
                            None
                        }
                    }
                }
            },
            |submission: &Submission, result: &Outcome| match result {
                Some((_, projection)) => {
                    projection.validate() && submission.aggregated_status == SubmissionStatus::InProgress
                }
                None => false,
            },
            &self.critical_config,
        )
        .await;

        match outcome {
            Ok(CriticalOutcome::Ok { result: Some(built) }) => Some(built),
            Ok(CriticalOutcome::Ok { result: None }) => unreachable!("postcheck rejects every None result"),
            Ok(CriticalOutcome::PreconditionFailed) => {
                debug!(id = %submission_id, "submission is not eligible for processing");
                None
            }
            Ok(CriticalOutcome::PostconditionFailed { .. }) => {
                self.failures.report(FailureEvent::submission(
                    submission_id.clone(),
                    "deposit submission projection failed validation",
                ));
                None
            }
            Err(err) => {
                error!(id = %submission_id, error = %err, "critical interaction failed while preparing submission");
                None
            }
        }
    }

    async fn dispatch_repository(
        &self,
        submission_id: ResourceId,
        repository_id: ResourceId,
        projection: Arc<DepositSubmission>,
    ) {
        let repository = match self.store.read_repository(repository_id.clone()).await {
            Ok(repository) => repository,
            Err(err) => {
                error!(submission_id = %submission_id, repository_id = %repository_id, error = %err, "failed to read repository");
                return;
            }
        };

        if repository.integration_type == IntegrationType::WebLink {
            return;
        }

        let packager = match self.packagers.resolve(&repository) {
            Ok(packager) => packager,
            Err(err) => {
                error!(
                    submission_id = %submission_id,
                    repository_id = %repository_id,
                    error = %err,
                    "no packager available for repository, skipping"
                );
                return;
            }
        };

        let deposit = Deposit::new(submission_id.clone(), repository_id.clone());
        let deposit = match self.store.create_deposit(deposit).await {
            Ok(deposit) => deposit,
            Err(err) => {
                self.failures.report(FailureEvent::submission(
                    submission_id.clone(),
                    format!("failed to create deposit for repository {repository_id}: {err}"),
                ));
                return;
            }
        };

        let deposit_id = deposit.id.clone();
        let task = DepositTask {
            ctx: DepositWorkContext {
                submission_id,
                deposit_id: deposit_id.clone(),
                repository,
                deposit_submission: projection,
                packager,
            },
            store: self.store.clone(),
            locks: self.locks.clone(),
            failures: self.failures.clone(),
            critical_config: self.critical_config.clone(),
            status_fetcher: self.status_fetcher.clone(),
        };

        if let Err(PoolRejected(label)) = self.pool.submit(deposit_id.as_str().to_string(), task.run()) {
            self.failures.report(FailureEvent::deposit(deposit_id, format!("worker pool rejected task: {label}")));
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use deposit_config::RepositoryConfigRegistry;
    use deposit_primitives::{
        AssemblerOptions, ProtocolBinding, Repository, RepositoryConfig, StatusMapping, SubmissionFile,
        SubmissionMetadata,
    };
    use deposit_testkit::{FailingSubmissionBuilder, FakeAssembler, FakeSubmissionBuilder, InMemoryStore};
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use crate::errors::ResolveError;
    use crate::packager::{ProtocolKind, TransportRuntimeOptions};

    struct NeverCalledFetcher;

    #[async_trait]
    impl StatusDocumentFetcher for NeverCalledFetcher {
        async fn fetch(&self, _url: &str, _auth: Option<(&str, &str)>, _follow: bool) -> Result<String, ResolveError> {
            panic!("status fetcher should not be invoked in these tests")
        }
    }

    fn sample_cfg() -> RepositoryConfig {
        RepositoryConfig {
            repository_key: "k".into(),
            assembler_id: "bagit".into(),
            assembler_options: AssemblerOptions::default(),
            protocol_binding: ProtocolBinding::Filesystem { base_dir: "/tmp".into(), overwrite: false, create_if_missing: true },
            auth_realms: vec![],
            status_mapping: StatusMapping::default(),
            deposit_status_processor_id: "atom".into(),
            settle_interval_ms: 10_000,
            statement_url_rewrite_prefix: None,
            statement_url_rewrite_replacement: None,
            follow_redirects: true,
        }
    }

    fn sample_submission(repositories: Vec<ResourceId>) -> Submission {
        Submission {
            id: ResourceId::new(),
            submitted: true,
            aggregated_status: SubmissionStatus::NotStarted,
            repositories,
            files: vec![SubmissionFile { name: "manuscript.pdf".into(), location: "http://x/1".into(), role: "manuscript".into() }],
            metadata: SubmissionMetadata::default(),
            etag: None,
        }
    }

    fn make_processor(
        store: Arc<InMemoryStore>,
        builder: Arc<dyn DepositSubmissionBuilder>,
        queue_capacity: usize,
    ) -> SubmissionProcessor {
        let mut configs = HashMap::new();
        configs.insert("k".to_string(), sample_cfg());
        let registry = RepositoryConfigRegistry::new(configs);

        let mut assemblers: HashMap<String, Arc<dyn deposit_collaborators::Assembler>> = HashMap::new();
        assemblers.insert("bagit".to_string(), Arc::new(FakeAssembler));

        let mut transports: HashMap<ProtocolKind, Arc<dyn deposit_collaborators::Transport>> = HashMap::new();
        transports.insert(
            ProtocolKind::Filesystem,
            Arc::new(deposit_testkit::ScriptedTransport::new(deposit_testkit::ScriptedSend::Opaque)),
        );

        let packagers = PackagerResolver::new(
            registry,
            assemblers,
            transports,
            TransportRuntimeOptions { connect_timeout_ms: 1000, read_timeout_ms: 1000, user_agent: "test".into() },
        );

        let (failures, _rx) = crate::failure_channel::channel(8);

        SubmissionProcessor {
            store,
            locks: CriticalLocks::new(),
            critical_config: CriticalConfig::default(),
            builder,
            packagers,
            pool: Arc::new(WorkerPool::new(2, queue_capacity, Duration::from_secs(1))),
            failures,
            policy: Arc::new(DefaultSubmissionPolicy),
            status_fetcher: Arc::new(NeverCalledFetcher),
        }
    }

    #[tokio::test]
    async fn eligible_submission_spawns_one_deposit_per_non_weblink_repository() {
        let store = Arc::new(InMemoryStore::new());

        let full_repo = Repository { id: ResourceId::new(), repository_key: "k".into(), name: "full".into(), integration_type: IntegrationType::Full, etag: None };
        let link_repo = Repository { id: ResourceId::new(), repository_key: "k".into(), name: "link".into(), integration_type: IntegrationType::WebLink, etag: None };
        store.seed_repository(full_repo.clone()).await;
        store.seed_repository(link_repo.clone()).await;

        let submission = store.seed_submission(sample_submission(vec![full_repo.id.clone(), link_repo.id.clone()])).await;

        let processor = make_processor(store.clone(), Arc::new(FakeSubmissionBuilder), 8);
        processor.process(submission.id.clone()).await;

        // Give the worker pool's background task a chance to run.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let deposits = store.find_deposits_by_submission(submission.id.clone()).await.unwrap();
        assert_eq!(deposits.len(), 1, "only the non-WEB_LINK repository should get a deposit");

        let updated = store.read_submission(submission.id).await.unwrap();
        assert_eq!(updated.aggregated_status, SubmissionStatus::InProgress);
    }

    #[tokio::test]
    async fn submission_not_yet_submitted_is_left_alone() {
        let store = Arc::new(InMemoryStore::new());
        let mut submission = sample_submission(vec![]);
        submission.submitted = false;
        let submission = store.seed_submission(submission).await;

        let processor = make_processor(store.clone(), Arc::new(FakeSubmissionBuilder), 8);
        processor.process(submission.id.clone()).await;

        let unchanged = store.read_submission(submission.id).await.unwrap();
        assert_eq!(unchanged.aggregated_status, SubmissionStatus::NotStarted);
    }

    #[tokio::test]
    async fn builder_failure_reports_submission_failure_and_creates_no_deposits() {
        let store = Arc::new(InMemoryStore::new());
        let repo = Repository { id: ResourceId::new(), repository_key: "k".into(), name: "full".into(), integration_type: IntegrationType::Full, etag: None };
        store.seed_repository(repo.clone()).await;
        let submission = store.seed_submission(sample_submission(vec![repo.id.clone()])).await;

        let (failures, mut rx) = crate::failure_channel::channel(8);
        let mut processor = make_processor(store.clone(), Arc::new(FailingSubmissionBuilder), 8);
        processor.failures = failures;

        processor.process(submission.id.clone()).await;

        let event = rx.try_recv().expect("expected a reported failure");
        assert_eq!(event.id, submission.id);

        let deposits = store.find_deposits_by_submission(submission.id).await.unwrap();
        assert!(deposits.is_empty());
    }

    #[tokio::test]
    async fn zero_file_submission_fails_postcheck() {
        let store = Arc::new(InMemoryStore::new());
        let repo = Repository { id: ResourceId::new(), repository_key: "k".into(), name: "full".into(), integration_type: IntegrationType::Full, etag: None };
        store.seed_repository(repo.clone()).await;

        let mut submission = sample_submission(vec![repo.id.clone()]);
        submission.files = vec![];
        let submission = store.seed_submission(submission).await;

        let (failures, mut rx) = crate::failure_channel::channel(8);
        let mut processor = make_processor(store.clone(), Arc::new(FakeSubmissionBuilder), 8);
        processor.failures = failures;

        processor.process(submission.id.clone()).await;

        assert!(rx.try_recv().is_ok());
        let deposits = store.find_deposits_by_submission(submission.id).await.unwrap();
        assert!(deposits.is_empty());
    }
}
