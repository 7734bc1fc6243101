//! C2 — the in-memory repository configuration registry.
//!
//! Loaded once at startup from a structured document and read-only
//! thereafter (§5: "the in-memory RepositoryConfig registry (read-only
//! after init)" is the one piece of process-wide shared state besides the
//! metadata store itself).

pub mod document;
pub mod errors;
pub mod registry;

pub use document::{ConfigDocument, DocAssembler, DocDepositConfig, DocMapping, DocProcessing, DocRepositoryConfig, DocTransportConfig};
pub use errors::{ConfigError, ResolveConfigError};
pub use registry::RepositoryConfigRegistry;
