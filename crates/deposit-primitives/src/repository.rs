use serde::{Deserialize, Serialize};

use crate::id::{Etag, ResourceId};

/// How the core may interact with a deposit target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrationType {
    /// Full custodial transfer: package built, transported, tracked.
    Full,
    /// Content is sent but the repository never reports back.
    OneWay,
    /// No transfer occurs; the submission merely links out.
    WebLink,
}

/// A deposit target, linked off-line to a [`crate::repository_config::RepositoryConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: ResourceId,
    /// Stable string key used to resolve a [`crate::repository_config::RepositoryConfig`].
    pub repository_key: String,
    pub name: String,
    pub integration_type: IntegrationType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub etag: Option<Etag>,
}
