//! The Deposit Processing Core: the concurrency-controlled pipeline that
//! consumes submission events, reserves work via optimistic concurrency on
//! a shared metadata store, dispatches packaging+transport tasks to a
//! bounded worker pool, interprets heterogeneous response formats to derive
//! a logical deposit status, and periodically reconciles outstanding
//! deposits.
//!
//! Module-to-component map (see spec §2):
//!
//! - [`critical`] — C3, CriticalInteraction
//! - [`status_resolver`] — C4, DepositStatusResolver
//! - [`task`] — C5, DepositTask
//! - [`submission_processor`] — C6, SubmissionProcessor
//! - [`deposit_updater`] — C7, DepositUpdater
//! - [`submission_status_updater`] — C8, SubmissionStatusUpdater
//! - [`worker_pool`] — C9, WorkerPool
//!
//! C1 (StatusEvaluator/StatusMapping) and C2 (RepositoryConfigRegistry) live
//! in `deposit-primitives` and `deposit-config` respectively, since they are
//! plain data + lookup logic shared by several of the modules above.

pub mod critical;
pub mod deposit_updater;
pub mod errors;
pub mod failure_channel;
pub mod packager;
pub mod status_resolver;
pub mod submission_processor;
pub mod submission_status_updater;
pub mod task;
pub mod worker_pool;

pub use critical::{perform, CriticalConfig, CriticalLocks};
pub use deposit_updater::{run_once as run_deposit_updater_once, DepositUpdater};
pub use errors::{CriticalError, CriticalOutcome, PackagerResolveError, PoolRejected, ResolveError};
pub use failure_channel::{channel as failure_channel, run as run_failure_channel, FailureEvent, FailureReporter, ResourceKind};
pub use packager::{Packager, PackagerResolver, ProtocolKind, TransportRuntimeOptions};
pub use status_resolver::{basic_auth_header, resolve as resolve_status, ReqwestStatusFetcher, StatusDocumentFetcher};
pub use submission_processor::{DefaultSubmissionPolicy, SubmissionPolicy, SubmissionProcessor};
pub use submission_status_updater::{run_once as run_submission_status_updater_once, SubmissionStatusUpdater};
pub use task::{DepositTask, DepositWorkContext};
pub use worker_pool::WorkerPool;
