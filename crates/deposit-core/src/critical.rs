use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use deposit_collaborators::{MetadataStore, StoreEntity, StoreError};
use deposit_primitives::ResourceId;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::{CriticalError, CriticalOutcome};

/// Retry and backoff policy for a [`perform`] conflict loop.
#[derive(Debug, Clone)]
pub struct CriticalConfig {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for CriticalConfig {
    fn default() -> Self {
        Self { max_retries: 3, initial_backoff: Duration::from_millis(20), backoff_multiplier: 2.0 }
    }
}

/// A registry of per-resource-id async mutexes, shared by every caller of
/// [`perform`] in this process.
///
/// The store's etag guards writes across processes/actors, but does nothing
/// to stop two concurrent in-process callers from both reading the same
/// resource, both running `mutate`'s side effects (e.g. a transport send),
/// and only then discovering via a write conflict that one of them lost.
/// For a `mutate` with external side effects — exactly `DepositTask`'s
/// Phase A — that is one transport send too many, not just one wasted
/// write. `CriticalLocks` closes that gap locally: `perform` holds the lock
/// for `id` across its entire read-precheck-mutate-write sequence, so at
/// most one in-process caller is ever inside that sequence for a given
/// resource at a time (§8 Testable Property 1). This is purely a local
/// optimization; the etag protocol underneath remains the cross-process
/// safety net (§5).
#[derive(Debug, Clone, Default)]
pub struct CriticalLocks {
    by_id: Arc<Mutex<HashMap<ResourceId, Arc<Mutex<()>>>>>,
}

impl CriticalLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn acquire(&self, id: &ResourceId) -> Arc<Mutex<()>> {
        let mut table = self.by_id.lock().await;
        table.entry(id.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

/// The optimistic-concurrency mutation primitive every write to a shared
/// resource in this core must go through (C3, §4.1).
///
/// `precheck` and `postcheck` are `Fn`, not `FnOnce`, and so is `mutate`:
/// on a conflict the resource is re-read and `mutate` is invoked again
/// against the fresh copy, exactly as §4.1 step 5 specifies ("re-read,
/// re-apply `mutate` to the fresh copy, retry write").
pub async fn perform<T, R, Pre, Mut, MutFut, Post>(
    store: &dyn MetadataStore,
    locks: &CriticalLocks,
    id: ResourceId,
    precheck: Pre,
    mutate: Mut,
    postcheck: Post,
    config: &CriticalConfig,
) -> Result<CriticalOutcome<R>, CriticalError>
where
    T: StoreEntity,
    Pre: Fn(&T) -> bool,
    Mut: Fn(&mut T) -> MutFut,
    MutFut: Future<Output = R>,
    Post: Fn(&T, &R) -> bool,
{
    let lock = locks.acquire(&id).await;
    let _guard = lock.lock().await;

    let mut backoff = config.initial_backoff;

    for attempt in 0..=config.max_retries {
        let mut resource = T::fetch(store, id.clone()).await?;

        if !precheck(&resource) {
            debug!(id = %id, "critical interaction: precondition failed");
            return Ok(CriticalOutcome::PreconditionFailed);
        }

        let result = mutate(&mut resource).await;

        match T::persist(store, &resource).await {
            Ok(fresh) => {
                return if postcheck(&fresh, &result) {
                    Ok(CriticalOutcome::Ok { result })
                } else {
                    debug!(id = %id, "critical interaction: postcondition failed");
                    Ok(CriticalOutcome::PostconditionFailed { result })
                };
            }
            Err(StoreError::Conflict(_)) if attempt < config.max_retries => {
                warn!(id = %id, attempt, "critical interaction: conflict, retrying");
                tokio::time::sleep(backoff).await;
                backoff = backoff.mul_f64(config.backoff_multiplier);
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }

    unreachable!("loop always returns on its final iteration")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use deposit_collaborators::MockMetadataStore;
    use deposit_primitives::{Submission, SubmissionMetadata, SubmissionStatus};
    use proptest::prelude::*;

    use super::*;

    fn sample_submission(id: ResourceId, etag: &str) -> Submission {
        Submission {
            id,
            submitted: true,
            aggregated_status: SubmissionStatus::NotStarted,
            repositories: vec![],
            files: vec![],
            metadata: SubmissionMetadata::default(),
            etag: Some(deposit_primitives::Etag(etag.to_string())),
        }
    }

    #[tokio::test]
    async fn precondition_failure_short_circuits_before_any_write() {
        let id = ResourceId::new();
        let mut store = MockMetadataStore::new();
        let returned = sample_submission(id.clone(), "1");
        store.expect_read_submission().returning(move |_| Ok(returned.clone()));
        // No expect_update_submission set: a call would panic the mock.

        let outcome = perform::<Submission, (), _, _, _, _>(
            &store,
            &CriticalLocks::new(),
            id,
            |_s: &Submission| false,
            |_s| async {},
            |_s, _r| true,
            &CriticalConfig::default(),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, CriticalOutcome::PreconditionFailed));
    }

    #[tokio::test]
    async fn postcondition_failure_is_reported_after_a_successful_write() {
        let id = ResourceId::new();
        let mut store = MockMetadataStore::new();
        let returned = sample_submission(id.clone(), "1");
        store.expect_read_submission().returning(move |_| Ok(returned.clone()));
        store.expect_update_submission().returning(|s| Ok(s.clone()));

        let outcome = perform::<Submission, (), _, _, _, _>(
            &store,
            &CriticalLocks::new(),
            id,
            |_s: &Submission| true,
            |s: &mut Submission| {
                s.aggregated_status = SubmissionStatus::InProgress;
                async {}
            },
            |_s, _r| false,
            &CriticalConfig::default(),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, CriticalOutcome::PostconditionFailed { .. }));
    }

    #[tokio::test]
    async fn conflict_is_retried_with_mutate_reapplied() {
        let id = ResourceId::new();
        let mut store = MockMetadataStore::new();
        let calls = std::sync::Arc::new(AtomicUsize::new(0));

        store.expect_read_submission().returning(move |i| Ok(sample_submission(i, "1")));

        let update_calls = calls.clone();
        store.expect_update_submission().returning(move |s| {
            let n = update_calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(StoreError::Conflict(s.id.to_string()))
            } else {
                Ok(s.clone())
            }
        });

        let mutate_calls = std::sync::Arc::new(AtomicUsize::new(0));
        let mutate_calls_inner = mutate_calls.clone();

        let outcome = perform::<Submission, (), _, _, _, _>(
            &store,
            &CriticalLocks::new(),
            id,
            |_s: &Submission| true,
            move |s: &mut Submission| {
                mutate_calls_inner.fetch_add(1, Ordering::SeqCst);
                s.aggregated_status = SubmissionStatus::InProgress;
                async {}
            },
            |_s, _r| true,
            &CriticalConfig::default(),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, CriticalOutcome::Ok { .. }));
        assert_eq!(mutate_calls.load(Ordering::SeqCst), 2, "mutate must be re-applied on conflict retry");
    }

    #[tokio::test]
    async fn conflict_exhausting_retry_budget_surfaces_as_an_error() {
        let id = ResourceId::new();
        let mut store = MockMetadataStore::new();
        store.expect_read_submission().returning(move |i| Ok(sample_submission(i, "1")));
        store.expect_update_submission().returning(|s| Err(StoreError::Conflict(s.id.to_string())));

        let config = CriticalConfig { max_retries: 2, initial_backoff: Duration::from_millis(1), backoff_multiplier: 1.0 };

        let result = perform::<Submission, (), _, _, _, _>(
            &store,
            &CriticalLocks::new(),
            id,
            |_s: &Submission| true,
            |s: &mut Submission| {
                s.aggregated_status = SubmissionStatus::InProgress;
                async {}
            },
            |_s, _r| true,
            &config,
        )
        .await;

        assert!(matches!(result, Err(CriticalError::Store(StoreError::Conflict(_)))));
    }

    #[tokio::test]
    async fn concurrent_invocations_on_the_same_id_serialize_through_mutate() {
        // §8 Testable Property 1, at the C3 level: N concurrent `perform`
        // calls against the same resource id must not overlap inside the
        // read-precheck-mutate-write sequence. We assert this by having
        // `mutate` record whether another call was already "inside" when it
        // started; if locking works, that's never true.
        let id = ResourceId::new();
        let mut store = MockMetadataStore::new();
        store.expect_read_submission().returning(move |i| Ok(sample_submission(i, "1")));
        store.expect_update_submission().returning(|s| Ok(s.clone()));

        let store = std::sync::Arc::new(store);
        let locks = CriticalLocks::new();
        let inside = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let overlap_detected = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let locks = locks.clone();
            let id = id.clone();
            let inside = inside.clone();
            let overlap_detected = overlap_detected.clone();

            handles.push(tokio::spawn(async move {
                let inside_inner = inside.clone();
                let overlap_inner = overlap_detected.clone();

                perform::<Submission, (), _, _, _, _>(
                    store.as_ref(),
                    &locks,
                    id,
                    |_s: &Submission| true,
                    move |s: &mut Submission| {
                        let inside_inner = inside_inner.clone();
                        let overlap_inner = overlap_inner.clone();
                        s.aggregated_status = SubmissionStatus::InProgress;
                        async move {
                            if inside_inner.fetch_add(1, Ordering::SeqCst) != 0 {
                                overlap_inner.store(true, Ordering::SeqCst);
                            }
                            tokio::task::yield_now().await;
                            inside_inner.fetch_sub(1, Ordering::SeqCst);
                        }
                    },
                    |_s, _r| true,
                    &CriticalConfig::default(),
                )
                .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(!overlap_detected.load(Ordering::SeqCst), "two mutates overlapped on the same resource id");
    }

    proptest::proptest! {
        /// `CriticalLocks` keys purely on [`ResourceId`] equality: acquiring
        /// the same id twice (even via separately-constructed `ResourceId`
        /// values) must hand back the exact same mutex, never a distinct
        /// one that would let two concurrent callers both enter the
        /// critical section for what is logically one resource.
        #[test]
        fn acquire_is_keyed_by_id_equality(raw_id in "[a-zA-Z0-9/_.:-]{1,40}") {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let locks = CriticalLocks::new();
                let a = locks.acquire(&ResourceId::from_str(raw_id.clone())).await;
                let b = locks.acquire(&ResourceId::from_str(raw_id.clone())).await;
                prop_assert!(Arc::ptr_eq(&a, &b));

                let other = locks.acquire(&ResourceId::from_str(format!("{raw_id}-distinct"))).await;
                prop_assert!(!Arc::ptr_eq(&a, &other));
                Ok(())
            })?;
        }
    }
}
