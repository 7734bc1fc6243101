use async_trait::async_trait;
use deposit_primitives::{Deposit, DepositStatus, Repository, RepositoryCopy, ResourceId, Submission};

use crate::errors::StoreError;

/// Typed CRUD + attribute search over the resource kinds this core cares
/// about, keyed by opaque id. All writes are etag-guarded: the caller must
/// pass back the etag it last observed, and the store returns
/// [`StoreError::Conflict`] if the resource has since been modified by
/// someone else.
///
/// This is an external collaborator — the concrete implementation (an HTTP
/// client over the metadata repository's REST API, in production) lives
/// outside this crate. Only the interface is specified here.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn read_submission(&self, id: ResourceId) -> Result<Submission, StoreError>;
    async fn create_submission(&self, submission: Submission) -> Result<Submission, StoreError>;
    async fn update_submission(&self, submission: &Submission) -> Result<Submission, StoreError>;

    async fn read_deposit(&self, id: ResourceId) -> Result<Deposit, StoreError>;
    async fn create_deposit(&self, deposit: Deposit) -> Result<Deposit, StoreError>;
    async fn update_deposit(&self, deposit: &Deposit) -> Result<Deposit, StoreError>;

    /// Ids of all deposits belonging to a submission.
    async fn find_deposits_by_submission(&self, submission_id: ResourceId) -> Result<Vec<ResourceId>, StoreError>;

    /// Ids of all deposits whose status is one of `statuses`.
    async fn find_deposits_by_status(&self, statuses: &[DepositStatus]) -> Result<Vec<ResourceId>, StoreError>;

    /// Ids of all submissions that are `submitted` and not yet terminal.
    async fn find_active_submissions(&self) -> Result<Vec<ResourceId>, StoreError>;

    async fn read_repository(&self, id: ResourceId) -> Result<Repository, StoreError>;

    async fn read_repository_copy(&self, id: ResourceId) -> Result<RepositoryCopy, StoreError>;
    async fn create_repository_copy(&self, copy: RepositoryCopy) -> Result<RepositoryCopy, StoreError>;
    async fn update_repository_copy(&self, copy: &RepositoryCopy) -> Result<RepositoryCopy, StoreError>;
}

/// A resource kind that the critical interaction primitive (C3) knows how
/// to read and etag-write through a [`MetadataStore`].
///
/// Implemented for [`Submission`] and [`Deposit`] — the two resource kinds
/// this core mutates under optimistic concurrency. Adding a new mutable
/// resource kind to the core means adding an impl here, not touching C3
/// itself.
#[async_trait]
pub trait StoreEntity: Sized + Clone + Send + Sync {
    async fn fetch(store: &dyn MetadataStore, id: ResourceId) -> Result<Self, StoreError>;
    async fn persist(store: &dyn MetadataStore, value: &Self) -> Result<Self, StoreError>;
}

#[async_trait]
impl StoreEntity for Submission {
    async fn fetch(store: &dyn MetadataStore, id: ResourceId) -> Result<Self, StoreError> {
        store.read_submission(id).await
    }

    async fn persist(store: &dyn MetadataStore, value: &Self) -> Result<Self, StoreError> {
        store.update_submission(value).await
    }
}

#[async_trait]
impl StoreEntity for Deposit {
    async fn fetch(store: &dyn MetadataStore, id: ResourceId) -> Result<Self, StoreError> {
        store.read_deposit(id).await
    }

    async fn persist(store: &dyn MetadataStore, value: &Self) -> Result<Self, StoreError> {
        store.update_deposit(value).await
    }
}

/// A `RepositoryCopy`, once created, is mutated under the same
/// optimistic-concurrency discipline as `Submission` and `Deposit`.
#[async_trait]
impl StoreEntity for RepositoryCopy {
    async fn fetch(store: &dyn MetadataStore, id: ResourceId) -> Result<Self, StoreError> {
        store.read_repository_copy(id).await
    }

    async fn persist(store: &dyn MetadataStore, value: &Self) -> Result<Self, StoreError> {
        store.update_repository_copy(value).await
    }
}
