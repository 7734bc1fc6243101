use thiserror::Error;

use deposit_collaborators::StoreError;
use deposit_config::ResolveConfigError;

/// Errors surfaced by [`crate::status_resolver`] (C4): fetching and parsing
/// a deposit's status reference document.
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    #[error("failed to fetch status document: {0}")]
    Io(String),

    #[error("status document is malformed: {0}")]
    Malformed(String),

    /// The document was well-formed but contained no `sword-state` category
    /// the resolver recognizes — "UnmappedError" in the error taxonomy,
    /// distinct from a [`deposit_primitives::StatusMapping`] miss, which
    /// happens one layer up once a term has been recognized.
    #[error("status document contained no recognized sword-state term")]
    NoRecognizedTerm,
}

/// The outcome of one [`crate::critical::perform`] invocation, short of a
/// store-level I/O error.
#[derive(Debug)]
pub enum CriticalOutcome<R> {
    /// The write succeeded and `postcheck` accepted the result.
    Ok { result: R },
    /// `precheck` rejected the resource before any mutation was attempted.
    /// §7: "PreconditionFailed — recoverable; logged, not raised."
    PreconditionFailed,
    /// The write succeeded but `postcheck` rejected the outcome.
    PostconditionFailed { result: R },
}

/// Errors surfaced by [`crate::critical::perform`] (C3) itself: anything
/// that isn't a precondition/postcondition verdict. A conflict that
/// exhausts the retry budget surfaces here as [`StoreError::Conflict`].
#[derive(Error, Debug)]
pub enum CriticalError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A unit of work the worker pool could not accept because its backing
/// queue was full (§4.8, §8 Testable Property 8).
#[derive(Error, Debug)]
#[error("worker pool rejected task for deposit {0}")]
pub struct PoolRejected(pub String);

/// Errors resolving a [`crate::packager::Packager`] for a repository — a
/// [`deposit_config::ResolveConfigError`] (no registered `RepositoryConfig`)
/// or a missing assembler/transport binding for an otherwise-resolved
/// config. All three are `RemedialMisconfiguration` in the error taxonomy
/// (§7): logged with the repository's identity, not retried automatically.
#[derive(Error, Debug)]
pub enum PackagerResolveError {
    #[error(transparent)]
    Config(#[from] ResolveConfigError),

    #[error("no assembler registered for assembler id {0}")]
    UnknownAssembler(String),

    #[error("no transport registered for repository {0}'s protocol binding")]
    UnknownTransport(String),
}
