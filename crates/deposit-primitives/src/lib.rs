//! Shared data types for the deposit orchestrator: the resource shapes that
//! flow through the metadata store, plus the status vocabulary (C1) that
//! the rest of the core classifies and maps against.

pub mod deposit;
pub mod deposit_submission;
pub mod id;
pub mod repository;
pub mod repository_config;
pub mod repository_copy;
pub mod status;
pub mod submission;

pub use deposit::Deposit;
pub use deposit_submission::{DepositFile, DepositSubmission};
pub use id::{Etag, ResourceId};
pub use repository::{IntegrationType, Repository};
pub use repository_config::{
    AssemblerOptions, BasicAuthRealm, FtpMode, FtpTransferType, ProtocolBinding, RepositoryConfig,
};
pub use repository_copy::{CopyStatus, RepositoryCopy};
pub use status::{compute_aggregate, DepositStatus, ExternalStatusUri, StatusMapping, SubmissionStatus};
pub use submission::{Person, Submission, SubmissionFile, SubmissionMetadata};
