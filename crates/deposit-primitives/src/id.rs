use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for a resource kept in the metadata store.
///
/// Distinct resource kinds (submission, deposit, repository, ...) all share
/// this representation; the store keys by id *and* kind, so collisions
/// across kinds are not possible even though the wire representation is the
/// same.
///
/// Backed by a string rather than a `Uuid`: the metadata store this core
/// talks to assigns repository ids that are themselves URIs (see the
/// RepositoryConfig resolution order, which matches against the id's URI
/// path), so the id type must be able to hold an arbitrary opaque string,
/// not just a v4 UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Mints a fresh, store-local id. Production ids are normally assigned
    /// by the metadata store itself; this is for constructing resources the
    /// core creates in memory before the first `create` round-trip.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_str(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Opaque optimistic-concurrency token returned by the metadata store on
/// every read, required on every write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Etag(pub String);

impl fmt::Display for Etag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
