//! A JSON-file-backed [`MetadataStore`] for running the orchestrator
//! without a real metadata repository behind it.
//!
//! Mirrors `deposit-testkit::InMemoryStore`'s etag discipline exactly —
//! every write is checked against the etag last handed out, and a stale
//! etag is rejected as a [`StoreError::Conflict`] — but persists each
//! table to its own file under `data_dir` so state survives a restart.
//! Every mutation holds the table's mutex across the read-modify-write AND
//! the flush to disk, so two in-process writers cannot interleave their
//! file writes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use deposit_collaborators::{MetadataStore, StoreError};
use deposit_primitives::{Deposit, DepositStatus, Etag, Repository, RepositoryCopy, ResourceId, Submission};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;

type Table<T> = Mutex<HashMap<ResourceId, (T, Etag)>>;

#[derive(Debug)]
pub struct FsMetadataStore {
    base_dir: PathBuf,
    submissions: Table<Submission>,
    deposits: Table<Deposit>,
    repositories: Table<Repository>,
    repository_copies: Table<RepositoryCopy>,
    next_etag: AtomicU64,
}

impl FsMetadataStore {
    /// Loads whatever tables already exist under `base_dir`, creating the
    /// directory (and empty tables) if this is a first run.
    pub fn open(base_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;

        let submissions = load_table::<Submission>(&base_dir, "submissions.json")?;
        let deposits = load_table::<Deposit>(&base_dir, "deposits.json")?;
        let repositories = load_table::<Repository>(&base_dir, "repositories.json")?;
        let repository_copies = load_table::<RepositoryCopy>(&base_dir, "repository_copies.json")?;

        let high_water = [&submissions, &deposits, &repositories, &repository_copies]
            .into_iter()
            .flat_map(|table| table.values())
            .filter_map(|(_, etag)| etag.0.parse::<u64>().ok())
            .max()
            .unwrap_or(0);

        Ok(Self {
            submissions: Mutex::new(submissions),
            deposits: Mutex::new(deposits),
            repositories: Mutex::new(repositories),
            repository_copies: Mutex::new(repository_copies),
            next_etag: AtomicU64::new(high_water + 1),
            base_dir,
        })
    }

    /// Registers (or overwrites) a repository definition directly. A
    /// repository is read-only from this core's perspective, so there is
    /// no `create`/`update` pair through the trait — this is the operator
    /// entry point for populating them.
    pub async fn put_repository(&self, repository: Repository) -> anyhow::Result<()> {
        let etag = self.mint_etag();
        let mut guard = self.repositories.lock().await;
        guard.insert(repository.id.clone(), (repository, etag));
        flush_table(&self.base_dir, "repositories.json", &guard)?;
        Ok(())
    }

    fn mint_etag(&self) -> Etag {
        Etag(self.next_etag.fetch_add(1, Ordering::SeqCst).to_string())
    }
}

fn load_table<T: DeserializeOwned>(base_dir: &Path, file_name: &str) -> anyhow::Result<HashMap<ResourceId, (T, Etag)>> {
    let path = base_dir.join(file_name);
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn flush_table<T: Serialize>(base_dir: &Path, file_name: &str, table: &HashMap<ResourceId, (T, Etag)>) -> anyhow::Result<()> {
    let path = base_dir.join(file_name);
    let serialized = serde_json::to_string_pretty(table)?;
    std::fs::write(path, serialized)?;
    Ok(())
}

#[async_trait]
impl MetadataStore for FsMetadataStore {
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
        let mut guard = self.submissions.lock().await;
        guard.insert(stored.id.clone(), (stored.clone(), etag));
        flush_table(&self.base_dir, "submissions.json", &guard).map_err(|err| StoreError::Io(err.to_string()))?;
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
        flush_table(&self.base_dir, "submissions.json", &guard).map_err(|err| StoreError::Io(err.to_string()))?;
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
        let mut guard = self.deposits.lock().await;
        guard.insert(stored.id.clone(), (stored.clone(), etag));
        flush_table(&self.base_dir, "deposits.json", &guard).map_err(|err| StoreError::Io(err.to_string()))?;
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
        flush_table(&self.base_dir, "deposits.json", &guard).map_err(|err| StoreError::Io(err.to_string()))?;
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
        let mut guard = self.repository_copies.lock().await;
        guard.insert(stored.id.clone(), (stored.clone(), etag));
        flush_table(&self.base_dir, "repository_copies.json", &guard).map_err(|err| StoreError::Io(err.to_string()))?;
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
        flush_table(&self.base_dir, "repository_copies.json", &guard).map_err(|err| StoreError::Io(err.to_string()))?;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use deposit_primitives::SubmissionMetadata;
    use deposit_primitives::SubmissionStatus;

    use super::*;

    fn sample_submission() -> Submission {
        Submission {
            id: ResourceId::new(),
            submitted: true,
            aggregated_status: SubmissionStatus::NotStarted,
            repositories: vec![],
            files: vec![],
            metadata: SubmissionMetadata::default(),
            etag: None,
        }
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempdir();
        let submission = {
            let store = FsMetadataStore::open(&dir).unwrap();
            store.create_submission(sample_submission()).await.unwrap()
        };

        let reopened = FsMetadataStore::open(&dir).unwrap();
        let read_back = reopened.read_submission(submission.id.clone()).await.unwrap();
        assert_eq!(read_back.id, submission.id);
    }

    #[tokio::test]
    async fn stale_etag_is_rejected_after_reopen() {
        let dir = tempdir();
        let created = {
            let store = FsMetadataStore::open(&dir).unwrap();
            store.create_submission(sample_submission()).await.unwrap()
        };

        let reopened = FsMetadataStore::open(&dir).unwrap();
        let mut updated = created.clone();
        updated.aggregated_status = SubmissionStatus::InProgress;
        reopened.update_submission(&updated).await.unwrap();

        let result = reopened.update_submission(&created).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    fn tempdir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("deposit-orchestrator-test-{}", ResourceId::new()));
        dir
    }
}
