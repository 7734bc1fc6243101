use thiserror::Error;

/// Errors raised while loading the repository configuration document at
/// startup. Both variants are `Fatal` per the service's error taxonomy: the
/// process exits rather than retrying.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration document: {0}")]
    Io(String),

    #[error("failed to parse configuration document: {0}")]
    Parse(String),
}

/// The outcome of resolving a [`RepositoryConfig`](deposit_primitives::RepositoryConfig)
/// for a repository. `Unresolved` is a remedial misconfiguration: it is
/// logged with the repository's identity and not retried automatically.
#[derive(Error, Debug)]
pub enum ResolveConfigError {
    #[error("no repository configuration registered for repository {0} (key {1})")]
    Unresolved(String, String),
}
