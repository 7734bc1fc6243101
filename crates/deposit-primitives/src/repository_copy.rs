use serde::{Deserialize, Serialize};

use crate::id::{Etag, ResourceId};

/// Tracks whether `copy_status` reflects a completed, in-progress, rejected,
/// or stalled copy of the content in the target repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CopyStatus {
    InProgress,
    Complete,
    Rejected,
    Stalled,
}

/// The artifact that (allegedly) exists in the target repository.
///
/// Created when a physical transfer succeeds; `copy_status` tracks the
/// owning [`crate::deposit::Deposit`]'s `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryCopy {
    pub id: ResourceId,
    pub repository_id: ResourceId,
    pub publication_id: Option<String>,
    pub external_ids: Vec<String>,
    pub access_url: Option<String>,
    pub copy_status: CopyStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub etag: Option<Etag>,
}

impl RepositoryCopy {
    pub fn new_in_progress(repository_id: ResourceId) -> Self {
        Self {
            id: ResourceId::new(),
            repository_id,
            publication_id: None,
            external_ids: Vec::new(),
            access_url: None,
            copy_status: CopyStatus::InProgress,
            etag: None,
        }
    }
}
