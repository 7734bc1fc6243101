use thiserror::Error;

/// Errors surfaced by the [`crate::metadata_store::MetadataStore`] collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("resource {0} not found")]
    NotFound(String),

    /// Raised by the store on a stale etag. Handled inside the critical
    /// interaction primitive by retry; callers outside it should treat this
    /// as a transient error.
    #[error("conflict: resource {0} was modified concurrently")]
    Conflict(String),

    #[error("store I/O error: {0}")]
    Io(String),
}

/// Errors surfaced by the [`crate::assembler::Assembler`] collaborator.
#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("failed to assemble package: {0}")]
    Failed(String),
}

/// Errors surfaced by the [`crate::transport::Transport`] collaborator.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to open transport session: {0}")]
    OpenFailed(String),

    #[error("failed to send package: {0}")]
    SendFailed(String),
}

/// Errors surfaced by the [`crate::message_bus::MessageBus`] collaborator.
#[derive(Error, Debug)]
pub enum BusError {
    #[error("failed to acknowledge message {0}")]
    AckFailed(String),

    #[error("bus I/O error: {0}")]
    Io(String),
}

/// Errors surfaced by the [`crate::submission_builder::DepositSubmissionBuilder`]
/// collaborator.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("failed to build deposit submission: {0}")]
    Failed(String),
}
