use serde::{Deserialize, Serialize};

use crate::id::{Etag, ResourceId};
use crate::status::SubmissionStatus;

/// A file attached to a submission: name, content location, and role (e.g.
/// `manuscript`, `supplement`, `figure`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionFile {
    pub name: String,
    pub location: String,
    pub role: String,
}

/// Structured submission metadata: article, journal, manuscript, and the
/// people associated with the submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionMetadata {
    #[serde(default)]
    pub article_title: Option<String>,
    #[serde(default)]
    pub journal_title: Option<String>,
    #[serde(default)]
    pub manuscript_id: Option<String>,
    #[serde(default)]
    pub persons: Vec<Person>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub email: Option<String>,
    pub role: String,
}

/// A user's intent to deposit to N target repositories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: ResourceId,
    /// User has finalized intent. A submission with `submitted = false` is
    /// never processed.
    pub submitted: bool,
    pub aggregated_status: SubmissionStatus,
    /// Ordered set of Repository ids, N >= 1.
    pub repositories: Vec<ResourceId>,
    pub files: Vec<SubmissionFile>,
    pub metadata: SubmissionMetadata,
    /// Opaque concurrency token supplied by the store; `None` for a
    /// submission not yet persisted.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub etag: Option<Etag>,
}

impl Submission {
    /// `aggregatedStatus = Accepted` implies every child deposit is
    /// `Accepted`; this invariant is enforced by construction in C8, never
    /// checked retroactively here — this helper exists for test assertions.
    pub fn is_eligible_for_processing(&self) -> bool {
        self.submitted && self.aggregated_status == SubmissionStatus::NotStarted
    }
}
