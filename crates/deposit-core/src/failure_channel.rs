use deposit_collaborators::MetadataStore;
use deposit_primitives::{Deposit, ResourceId, Submission};
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::critical::{perform, CriticalConfig, CriticalLocks};
use crate::errors::CriticalOutcome;

/// The resource kind a [`FailureEvent`] concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Submission,
    Deposit,
}

/// A failure surfaced by any part of the core — a `DepositTask`'s captured
/// exception, a postcheck rejection, or a worker pool rejection (§7, §8
/// Testable Property 8). The handler loop marks the named resource
/// permanently `FAILED` via C3 so the periodic reconcilers retry it.
#[derive(Debug, Clone)]
pub struct FailureEvent {
    pub kind: ResourceKind,
    pub id: ResourceId,
    pub reason: String,
}

impl FailureEvent {
    pub fn deposit(id: ResourceId, reason: impl Into<String>) -> Self {
        Self { kind: ResourceKind::Deposit, id, reason: reason.into() }
    }

    pub fn submission(id: ResourceId, reason: impl Into<String>) -> Self {
        Self { kind: ResourceKind::Submission, id, reason: reason.into() }
    }
}

/// Cloneable handle used by any component to report a failure without
/// holding a reference to the handler loop itself.
#[derive(Debug, Clone)]
pub struct FailureReporter {
    tx: mpsc::Sender<FailureEvent>,
}

impl FailureReporter {
    pub fn report(&self, event: FailureEvent) {
        if let Err(err) = self.tx.try_send(event) {
            error!(error = %err, "failure channel is saturated, dropping failure report");
        }
    }
}

/// Builds a bounded failure channel and its handler loop. `capacity` bounds
/// how many in-flight failure reports may queue before `report` starts
/// dropping them — failure reporting itself must never block a worker.
pub fn channel(capacity: usize) -> (FailureReporter, mpsc::Receiver<FailureEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (FailureReporter { tx }, rx)
}

/// Runs until the channel is closed (all [`FailureReporter`] handles
/// dropped). Marks the named resource `FAILED`; errors doing so are logged,
/// not propagated — this is the last line of defense and has nowhere else
/// to report to.
pub async fn run(
    store: &dyn MetadataStore,
    locks: &CriticalLocks,
    mut rx: mpsc::Receiver<FailureEvent>,
    config: CriticalConfig,
) {
    while let Some(event) = rx.recv().await {
        warn!(id = %event.id, kind = ?event.kind, reason = %event.reason, "marking resource failed");

        let outcome = match event.kind {
            ResourceKind::Deposit => {
                perform::<Deposit, (), _, _, _, _>(
                    store,
                    locks,
                    event.id.clone(),
                    |d: &Deposit| !d.status.is_terminal(),
                    |d: &mut Deposit| {
                        d.mark_failed();
                        async {}
                    },
                    |d: &Deposit, _: &()| d.status.is_terminal(),
                    &config,
                )
                .await
            }
            ResourceKind::Submission => {
                perform::<Submission, (), _, _, _, _>(
                    store,
                    locks,
                    event.id.clone(),
                    |s: &Submission| !s.aggregated_status.is_terminal(),
                    |s: &mut Submission| {
                        s.aggregated_status = deposit_primitives::SubmissionStatus::Failed;
                        async {}
                    },
                    |s: &Submission, _: &()| s.aggregated_status == deposit_primitives::SubmissionStatus::Failed,
                    &config,
                )
                .await
            }
        };

        match outcome {
            Ok(CriticalOutcome::Ok { .. }) => {}
            Ok(CriticalOutcome::PreconditionFailed) => {
                warn!(id = %event.id, "failure handler: resource already terminal, nothing to mark");
            }
            Ok(CriticalOutcome::PostconditionFailed { .. }) => {
                error!(id = %event.id, "failure handler: marking failed did not stick");
            }
            Err(err) => {
                error!(id = %event.id, error = %err, "failure handler: store error marking resource failed");
            }
        }
    }
}
