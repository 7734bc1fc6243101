use serde::{Deserialize, Serialize};

use crate::id::{Etag, ResourceId};
use crate::status::DepositStatus;

/// One `(Submission, Repository)` tuple; records a transfer attempt.
///
/// Lifecycle: created by the submission processor with `status = Dirty`;
/// advanced to `Submitted` on successful byte transfer; advanced to
/// `Accepted`/`Rejected` when a terminal status is learned; set to `Failed`
/// by the failure handler. `status = Dirty` is eligible for (re)processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposit {
    pub id: ResourceId,
    pub submission_id: ResourceId,
    pub repository_id: ResourceId,
    pub status: DepositStatus,
    /// URL to an external status document (e.g. a SWORD Atom statement).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_copy_id: Option<ResourceId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub etag: Option<Etag>,
}

impl Deposit {
    pub fn new(submission_id: ResourceId, repository_id: ResourceId) -> Self {
        Self {
            id: ResourceId::new(),
            submission_id,
            repository_id,
            status: DepositStatus::Dirty,
            status_ref: None,
            repository_copy_id: None,
            etag: None,
        }
    }

    /// Clears the deposit back to dirty, ready for reprocessing. Used by
    /// the Phase A failure path when the underlying transport failed.
    pub fn mark_dirty(&mut self) {
        self.status = DepositStatus::Dirty;
    }

    /// Marks the deposit permanently failed. Used by the central failure
    /// channel handler (§7) so periodic reconcilers pick it up again.
    pub fn mark_failed(&mut self) {
        self.status = DepositStatus::Failed;
    }
}
