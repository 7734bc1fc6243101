use std::sync::Arc;
use std::time::Duration;

use deposit_collaborators::MetadataStore;
use deposit_config::RepositoryConfigRegistry;
use deposit_primitives::{CopyStatus, Deposit, DepositStatus, RepositoryCopy, ResourceId};
use tracing::{debug, error, info, instrument, warn};

use crate::critical::{perform, CriticalConfig, CriticalLocks};
use crate::errors::CriticalOutcome;
use crate::status_resolver::{self, StatusDocumentFetcher};

/// Tally of one [`run_once`] pass, logged by [`DepositUpdater::run`] at the
/// end of every tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileSummary {
    pub scanned: usize,
    pub advanced: usize,
}

/// Outcome of reconciling one deposit's status reference: either a terminal
/// status was resolved and persisted, the external token has no mapping
/// yet, or something prevented resolution this pass.
enum ReconcileOutcome {
    Resolved(DepositStatus),
    Unmapped,
    Error(String),
}

/// Periodic reconciler (C7, §4.6) for deposits whose terminal state is
/// learned asynchronously. Owns the interval; [`run_once`] is the pure
/// single-pass function underneath it, reused by the CLI's "update
/// deposits" entry point.
pub struct DepositUpdater {
    pub store: Arc<dyn MetadataStore>,
    pub locks: CriticalLocks,
    pub critical_config: CriticalConfig,
    pub config_registry: Arc<RepositoryConfigRegistry>,
    pub status_fetcher: Arc<dyn StatusDocumentFetcher>,
    pub interval: Duration,
}

impl DepositUpdater {
    #[instrument(skip_all, fields(component = "deposit_updater"))]
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let summary = run_once(
                self.store.as_ref(),
                &self.locks,
                &self.critical_config,
                self.config_registry.as_ref(),
                self.status_fetcher.as_ref(),
                None,
            )
            .await;
            info!(scanned = summary.scanned, advanced = summary.advanced, "deposit reconciliation pass complete");
        }
    }
}

/// One reconciliation pass. `scope`, when set, restricts the pass to the
/// given deposit ids (the CLI's "update deposits" entry point accepts an
/// optional id list); otherwise every deposit with `status ∈ {FAILED,
/// SUBMITTED}` is scanned — `FAILED` is included defensively even though
/// the per-deposit precheck below always rejects a terminal status, since a
/// deposit can be marked `FAILED` out from under a pending reconciliation.
pub async fn run_once(
    store: &dyn MetadataStore,
    locks: &CriticalLocks,
    critical_config: &CriticalConfig,
    config_registry: &RepositoryConfigRegistry,
    status_fetcher: &dyn StatusDocumentFetcher,
    scope: Option<&[ResourceId]>,
) -> ReconcileSummary {
    let candidates = match scope {
        Some(ids) => ids.to_vec(),
        None => match store.find_deposits_by_status(&[DepositStatus::Failed, DepositStatus::Submitted]).await {
            Ok(ids) => ids,
            Err(err) => {
                error!(error = %err, "failed to scan for reconcilable deposits");
                return ReconcileSummary::default();
            }
        },
    };

    let mut summary = ReconcileSummary::default();
    for id in candidates {
        summary.scanned += 1;
        if reconcile_one(store, locks, critical_config, config_registry, status_fetcher, id).await {
            summary.advanced += 1;
        }
    }
    summary
}

async fn reconcile_one(
    store: &dyn MetadataStore,
    locks: &CriticalLocks,
    critical_config: &CriticalConfig,
    config_registry: &RepositoryConfigRegistry,
    status_fetcher: &dyn StatusDocumentFetcher,
    deposit_id: ResourceId,
) -> bool {
    let outcome = perform::<Deposit, ReconcileOutcome, _, _, _, _>(
        store,
        locks,
        deposit_id.clone(),
        |deposit: &Deposit| !deposit.status.is_terminal() && deposit.status_ref.is_some(),
        |deposit: &mut Deposit| {
            reconcile_mutate(store, locks, critical_config, config_registry, status_fetcher, deposit)
        },
        |deposit: &Deposit, result: &ReconcileOutcome| match result {
            // §9: a deposit with a statusRef always has a linked
            // RepositoryCopy by construction; this is the postcheck that
            // verifies the invariant rather than papering over it.
            ReconcileOutcome::Resolved(_) => deposit.repository_copy_id.is_some(),
            ReconcileOutcome::Unmapped | ReconcileOutcome::Error(_) => true,
        },
        critical_config,
    )
    .await;

    match outcome {
        Ok(CriticalOutcome::Ok { result: ReconcileOutcome::Resolved(status) }) => {
            debug!(id = %deposit_id, ?status, "deposit reconciled to a terminal status");
            true
        }
        Ok(CriticalOutcome::Ok { result: ReconcileOutcome::Unmapped }) => {
            debug!(id = %deposit_id, "external status has no mapping yet");
            false
        }
        Ok(CriticalOutcome::Ok { result: ReconcileOutcome::Error(reason) }) => {
            debug!(id = %deposit_id, error = %reason, "could not reconcile deposit this pass");
            false
        }
        Ok(CriticalOutcome::PreconditionFailed) => false,
        Ok(CriticalOutcome::PostconditionFailed { .. }) => {
            error!(id = %deposit_id, "reconciliation postcheck failed: deposit has a status reference but no linked repository copy");
            false
        }
        Err(err) => {
            warn!(id = %deposit_id, error = %err, "reconciliation critical interaction failed");
            false
        }
    }
}

/// Spec §4.6's mutate step: read Repository (and, implicitly, the linked
/// RepositoryCopy), resolve the RepositoryConfig, call C4 + StatusMapping,
/// and on a terminal result persist both the deposit status (by the caller,
/// via the return value) and the RepositoryCopy status (here, via a nested
/// critical interaction).
async fn reconcile_mutate(
    store: &dyn MetadataStore,
    locks: &CriticalLocks,
    critical_config: &CriticalConfig,
    config_registry: &RepositoryConfigRegistry,
    status_fetcher: &dyn StatusDocumentFetcher,
    deposit: &mut Deposit,
) -> ReconcileOutcome {
    let repository = match store.read_repository(deposit.repository_id.clone()).await {
        Ok(repository) => repository,
        Err(err) => return ReconcileOutcome::Error(err.to_string()),
    };

    let copy_id = match deposit.repository_copy_id.clone() {
        Some(id) => id,
        None => return ReconcileOutcome::Error("deposit has a status reference but no linked repository copy".into()),
    };

    let cfg = match config_registry.resolve(&repository) {
        Ok(cfg) => cfg.clone(),
        Err(err) => return ReconcileOutcome::Error(err.to_string()),
    };

    let status_ref = match &deposit.status_ref {
        Some(status_ref) => status_ref.clone(),
        None => return ReconcileOutcome::Error("deposit has no status reference".into()),
    };

    let external_status = match status_resolver::resolve(status_fetcher, &status_ref, &cfg).await {
        Ok(status) => status,
        Err(err) => return ReconcileOutcome::Error(err.to_string()),
    };

    let internal_status = match cfg.status_mapping.lookup(&external_status) {
        Some(status) => status,
        None => return ReconcileOutcome::Unmapped,
    };

    let copy_status = match internal_status {
        DepositStatus::Accepted => CopyStatus::Complete,
        DepositStatus::Rejected => CopyStatus::Rejected,
        // SUBMITTED/DIRTY/FAILED are not meaningful resolutions of a status
        // reference; treat as unmapped and retry on a later pass.
        _ => return ReconcileOutcome::Unmapped,
    };

    let copy_outcome = perform::<RepositoryCopy, (), _, _, _, _>(
        store,
        locks,
        copy_id,
        |_: &RepositoryCopy| true,
        move |copy: &mut RepositoryCopy| {
            copy.copy_status = copy_status;
            async {}
        },
        move |copy: &RepositoryCopy, _: &()| copy.copy_status == copy_status,
        critical_config,
    )
    .await;

    if let Err(err) = copy_outcome {
        return ReconcileOutcome::Error(err.to_string());
    }

    deposit.status = internal_status;
    ReconcileOutcome::Resolved(internal_status)
}
