use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use deposit_collaborators::{MetadataStore, StoreError};
use deposit_primitives::{Deposit, DepositStatus, Etag, Repository, RepositoryCopy, ResourceId, Submission};
use tokio::sync::Mutex;

/// In-memory, etag-checked double for [`MetadataStore`], used across
/// `deposit-core`'s integration and property tests in place of a real HTTP
/// client. Mirrors the store's concurrency contract exactly: every write
/// must carry the etag last observed by the caller, and a stale etag is
/// rejected with [`StoreError::Conflict`] rather than silently overwritten.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    submissions: Mutex<HashMap<ResourceId, (Submission, Etag)>>,
    deposits: Mutex<HashMap<ResourceId, (Deposit, Etag)>>,
    repositories: Mutex<HashMap<ResourceId, (Repository, Etag)>>,
    repository_copies: Mutex<HashMap<ResourceId, (RepositoryCopy, Etag)>>,
    next_etag: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint_etag(&self) -> Etag {
        Etag(self.next_etag.fetch_add(1, Ordering::SeqCst).to_string())
    }

    /// Seeds a repository directly, bypassing etag checks — repositories
    /// are read-only from this core's perspective, so tests populate them
    /// up front rather than going through `create`.
    pub async fn seed_repository(&self, repository: Repository) {
        let etag = self.mint_etag();
        self.repositories.lock().await.insert(repository.id.clone(), (repository, etag));
    }

    pub async fn seed_submission(&self, submission: Submission) -> Submission {
        let etag = self.mint_etag();
        let mut stored = submission;
        stored.etag = Some(etag.clone());
        self.submissions.lock().await.insert(stored.id.clone(), (stored.clone(), etag));
        stored
    }
}

#[async_trait]
impl MetadataStore for InMemoryStore {
    async fn read_submission(&self, id: ResourceId) -> Result<Submission, StoreError> {
        let guard = self.submissions.lock().await;
        let (value, etag) = guard.get(&id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let mut value = value.clone();
        value.etag = Some(etag.clone());
        Ok(value)
    }

    async fn create_submission(&self, submission: Submission) -> Result<Submission, StoreError> {
        let etag = self.mint_etag();
        let mut stored = submission;
        stored.etag = Some(etag.clone());
        self.submissions.lock().await.insert(stored.id.clone(), (stored.clone(), etag));
        Ok(stored)
    }

    async fn update_submission(&self, submission: &Submission) -> Result<Submission, StoreError> {
        let mut guard = self.submissions.lock().await;
        let (_, current_etag) =
            guard.get(&submission.id).ok_or_else(|| StoreError::NotFound(submission.id.to_string()))?;

        match &submission.etag {
            Some(observed) if observed == current_etag => {}
            _ => return Err(StoreError::Conflict(submission.id.to_string())),
        }

        let new_etag = self.mint_etag();
        let mut stored = submission.clone();
        stored.etag = Some(new_etag.clone());
        guard.insert(stored.id.clone(), (stored.clone(), new_etag));
        Ok(stored)
    }

    async fn read_deposit(&self, id: ResourceId) -> Result<Deposit, StoreError> {
        let guard = self.deposits.lock().await;
        let (value, etag) = guard.get(&id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let mut value = value.clone();
        value.etag = Some(etag.clone());
        Ok(value)
    }

    async fn create_deposit(&self, deposit: Deposit) -> Result<Deposit, StoreError> {
        let etag = self.mint_etag();
        let mut stored = deposit;
        stored.etag = Some(etag.clone());
        self.deposits.lock().await.insert(stored.id.clone(), (stored.clone(), etag));
        Ok(stored)
    }

    async fn update_deposit(&self, deposit: &Deposit) -> Result<Deposit, StoreError> {
        let mut guard = self.deposits.lock().await;
        let (_, current_etag) = guard.get(&deposit.id).ok_or_else(|| StoreError::NotFound(deposit.id.to_string()))?;

        match &deposit.etag {
            Some(observed) if observed == current_etag => {}
            _ => return Err(StoreError::Conflict(deposit.id.to_string())),
        }

        let new_etag = self.mint_etag();
        let mut stored = deposit.clone();
        stored.etag = Some(new_etag.clone());
        guard.insert(stored.id.clone(), (stored.clone(), new_etag));
        Ok(stored)
    }

    async fn find_deposits_by_submission(&self, submission_id: ResourceId) -> Result<Vec<ResourceId>, StoreError> {
        let guard = self.deposits.lock().await;
        Ok(guard
            .values()
            .filter(|(deposit, _)| deposit.submission_id == submission_id)
            .map(|(deposit, _)| deposit.id.clone())
            .collect())
    }

    async fn find_deposits_by_status(&self, statuses: &[DepositStatus]) -> Result<Vec<ResourceId>, StoreError> {
        let guard = self.deposits.lock().await;
        Ok(guard
            .values()
            .filter(|(deposit, _)| statuses.contains(&deposit.status))
            .map(|(deposit, _)| deposit.id.clone())
            .collect())
    }

    async fn find_active_submissions(&self) -> Result<Vec<ResourceId>, StoreError> {
        let guard = self.submissions.lock().await;
        Ok(guard
            .values()
            .filter(|(submission, _)| submission.submitted && !submission.aggregated_status.is_terminal())
            .map(|(submission, _)| submission.id.clone())
            .collect())
    }

    async fn read_repository(&self, id: ResourceId) -> Result<Repository, StoreError> {
        let guard = self.repositories.lock().await;
        guard.get(&id).map(|(value, _)| value.clone()).ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn read_repository_copy(&self, id: ResourceId) -> Result<RepositoryCopy, StoreError> {
        let guard = self.repository_copies.lock().await;
        let (value, etag) = guard.get(&id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let mut value = value.clone();
        value.etag = Some(etag.clone());
        Ok(value)
    }

    async fn create_repository_copy(&self, copy: RepositoryCopy) -> Result<RepositoryCopy, StoreError> {
        let etag = self.mint_etag();
        let mut stored = copy;
        stored.etag = Some(etag.clone());
        self.repository_copies.lock().await.insert(stored.id.clone(), (stored.clone(), etag));
        Ok(stored)
    }

    async fn update_repository_copy(&self, copy: &RepositoryCopy) -> Result<RepositoryCopy, StoreError> {
        let mut guard = self.repository_copies.lock().await;
        let (_, current_etag) = guard.get(&copy.id).ok_or_else(|| StoreError::NotFound(copy.id.to_string()))?;

        match &copy.etag {
            Some(observed) if observed == current_etag => {}
            _ => return Err(StoreError::Conflict(copy.id.to_string())),
        }

        let new_etag = self.mint_etag();
        let mut stored = copy.clone();
        stored.etag = Some(new_etag.clone());
        guard.insert(stored.id.clone(), (stored.clone(), new_etag));
        Ok(stored)
    }
}
