//! Trait-level interfaces to the systems this core depends on but does not
//! own: the metadata repository, the packaging engine, the outbound
//! transport, and the trigger message bus.
//!
//! Nothing in this crate runs on its own; every trait here is implemented by
//! an adapter crate that lives outside this workspace. Keeping the
//! interfaces here, separate from `deposit-core`, lets the core be tested
//! against in-memory doubles (see `deposit-testkit`) without ever linking a
//! real HTTP client.

pub mod assembler;
pub mod errors;
pub mod message_bus;
pub mod metadata_store;
pub mod scoped_session;
pub mod submission_builder;
pub mod transport;

pub use assembler::{Assembler, PackageMeta, PackageStream};
pub use errors::{AssembleError, BuildError, BusError, StoreError, TransportError};
pub use message_bus::{MessageBus, ResourceType, TriggerEvent};
pub use metadata_store::{MetadataStore, StoreEntity};
#[cfg(feature = "test-utils")]
pub use metadata_store::MockMetadataStore;
pub use scoped_session::with_session;
pub use submission_builder::DepositSubmissionBuilder;
pub use transport::{Receipt, Session, Transport, TransportOptions, TransportResponse};
