use async_trait::async_trait;
use deposit_primitives::{DepositSubmission, Submission};

use crate::errors::BuildError;

/// Produces the core's in-memory, package-ready [`DepositSubmission`]
/// projection from a [`Submission`] and its linked entities (manuscript,
/// journal, article, persons) — an external collaborator per §1's scope:
/// the core consumes this projection but does not own how it is built.
#[async_trait]
pub trait DepositSubmissionBuilder: Send + Sync {
    async fn build(&self, submission: &Submission) -> Result<DepositSubmission, BuildError>;
}
