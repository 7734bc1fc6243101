use std::sync::Arc;
use std::time::Duration;

use deposit_collaborators::MetadataStore;
use deposit_primitives::{compute_aggregate, ResourceId, Submission, SubmissionStatus};
use tracing::{debug, error, info, instrument, warn};

use crate::critical::{perform, CriticalConfig, CriticalLocks};
use crate::errors::CriticalOutcome;

/// Tally of one [`run_once`] pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileSummary {
    pub scanned: usize,
    pub advanced: usize,
}

enum AggregateOutcome {
    Computed(SubmissionStatus),
    Error(String),
}

/// Periodic reconciler (C8, §4.7): keeps a submission's `aggregatedStatus`
/// in sync with its child deposits' statuses via [`compute_aggregate`].
pub struct SubmissionStatusUpdater {
    pub store: Arc<dyn MetadataStore>,
    pub locks: CriticalLocks,
    pub critical_config: CriticalConfig,
    pub interval: Duration,
}

impl SubmissionStatusUpdater {
    #[instrument(skip_all, fields(component = "submission_status_updater"))]
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let summary = run_once(self.store.as_ref(), &self.locks, &self.critical_config, None).await;
            info!(scanned = summary.scanned, advanced = summary.advanced, "submission status reconciliation pass complete");
        }
    }
}

/// One reconciliation pass. `scope`, when set, restricts the pass to the
/// given submission ids; otherwise every submitted, non-terminal
/// submission is scanned.
pub async fn run_once(
    store: &dyn MetadataStore,
    locks: &CriticalLocks,
    critical_config: &CriticalConfig,
    scope: Option<&[ResourceId]>,
) -> ReconcileSummary {
    let candidates = match scope {
        Some(ids) => ids.to_vec(),
        None => match store.find_active_submissions().await {
            Ok(ids) => ids,
            Err(err) => {
                error!(error = %err, "failed to scan for active submissions");
                return ReconcileSummary::default();
            }
        },
    };

    let mut summary = ReconcileSummary::default();
    for id in candidates {
        summary.scanned += 1;
        if reconcile_one(store, locks, critical_config, id).await {
            summary.advanced += 1;
        }
    }
    summary
}

async fn reconcile_one(
    store: &dyn MetadataStore,
    locks: &CriticalLocks,
    critical_config: &CriticalConfig,
    submission_id: ResourceId,
) -> bool {
    let outcome = perform::<Submission, AggregateOutcome, _, _, _, _>(
        store,
        locks,
        submission_id.clone(),
        |submission: &Submission| submission.submitted && !submission.aggregated_status.is_terminal(),
        |submission: &mut Submission| recompute(store, submission),
        |submission: &Submission, result: &AggregateOutcome| match result {
            AggregateOutcome::Computed(status) => submission.submitted && submission.aggregated_status == *status,
            AggregateOutcome::Error(_) => true,
        },
        critical_config,
    )
    .await;

    match outcome {
        Ok(CriticalOutcome::Ok { result: AggregateOutcome::Computed(status) }) => {
            debug!(id = %submission_id, ?status, "submission aggregate status updated");
            true
        }
        Ok(CriticalOutcome::Ok { result: AggregateOutcome::Error(reason) }) => {
            debug!(id = %submission_id, error = %reason, "could not recompute aggregate status this pass");
            false
        }
        Ok(CriticalOutcome::PreconditionFailed) => false,
        Ok(CriticalOutcome::PostconditionFailed { .. }) => {
            error!(id = %submission_id, "submission status postcheck failed");
            false
        }
        Err(err) => {
            warn!(id = %submission_id, error = %err, "submission status critical interaction failed");
            false
        }
    }
}

async fn recompute(store: &dyn MetadataStore, submission: &mut Submission) -> AggregateOutcome {
    let deposit_ids = match store.find_deposits_by_submission(submission.id.clone()).await {
        Ok(ids) => ids,
        Err(err) => return AggregateOutcome::Error(err.to_string()),
    };

    let mut statuses = Vec::with_capacity(deposit_ids.len());
    for id in deposit_ids {
        match store.read_deposit(id).await {
            Ok(deposit) => statuses.push(deposit.status),
            Err(err) => return AggregateOutcome::Error(err.to_string()),
        }
    }

    let new_status = compute_aggregate(&statuses);
    submission.aggregated_status = new_status;
    AggregateOutcome::Computed(new_status)
}
