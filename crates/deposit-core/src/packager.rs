use std::collections::HashMap;
use std::sync::Arc;

use deposit_collaborators::{Assembler, Transport, TransportOptions};
use deposit_config::RepositoryConfigRegistry;
use deposit_primitives::{ProtocolBinding, Repository, RepositoryConfig};

use crate::errors::PackagerResolveError;

/// The triple `(assembler, transport, configuration)` bound to a target
/// repository (glossary: *Packager*). Resolved once per repository by
/// [`PackagerResolver`], then shared (via `Arc`) across every
/// [`crate::task::DepositTask`] invocation for that repository.
#[derive(Clone)]
pub struct Packager {
    pub assembler: Arc<dyn Assembler>,
    pub transport: Arc<dyn Transport>,
    pub cfg: RepositoryConfig,
    /// Connection-level transport options derived from `cfg` and the
    /// runtime's env configuration (HTTP user-agent, timeouts) — built once
    /// when the packager is resolved so task execution never touches
    /// runtime config directly.
    pub transport_options: TransportOptions,
}

impl std::fmt::Debug for Packager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packager").field("repository_key", &self.cfg.repository_key).finish()
    }
}

/// The part of the transport's `asProperties()` projection (§9) that comes
/// from process configuration rather than from any one `RepositoryConfig`:
/// HTTP user-agent and connect/read timeouts (§6 Configuration).
#[derive(Debug, Clone)]
pub struct TransportRuntimeOptions {
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub user_agent: String,
}

/// Which concrete [`Transport`] implementation a [`ProtocolBinding`] is
/// bound to. A `Transport` is registered once per protocol kind, not once
/// per repository — every SWORDv2 target shares one `Transport`, for
/// instance, and is distinguished only by the `TransportOptions` passed to
/// `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    Filesystem,
    Ftp,
    SwordV2,
}

impl ProtocolKind {
    pub fn of(binding: &ProtocolBinding) -> Self {
        match binding {
            ProtocolBinding::Filesystem { .. } => ProtocolKind::Filesystem,
            ProtocolBinding::Ftp { .. } => ProtocolKind::Ftp,
            ProtocolBinding::SwordV2 { .. } => ProtocolKind::SwordV2,
        }
    }
}

/// Resolves the `(assembler, transport, configuration)` triple bound to a
/// repository, combining the C2 registry with the process-wide
/// assembler/transport registries built once at startup.
///
/// Design Notes §9: "the process-wide registries (Packager, Assembler,
/// Transport) are immutable after construction; model them as values built
/// once during init and passed by reference thereafter, not as singletons."
/// This struct is that value.
#[derive(Clone)]
pub struct PackagerResolver {
    config_registry: Arc<RepositoryConfigRegistry>,
    assemblers: Arc<HashMap<String, Arc<dyn Assembler>>>,
    transports: Arc<HashMap<ProtocolKind, Arc<dyn Transport>>>,
    runtime: TransportRuntimeOptions,
}

impl std::fmt::Debug for PackagerResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackagerResolver")
            .field("assemblers", &self.assemblers.keys().collect::<Vec<_>>())
            .field("transports", &self.transports.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PackagerResolver {
    pub fn new(
        config_registry: RepositoryConfigRegistry,
        assemblers: HashMap<String, Arc<dyn Assembler>>,
        transports: HashMap<ProtocolKind, Arc<dyn Transport>>,
        runtime: TransportRuntimeOptions,
    ) -> Self {
        Self {
            config_registry: Arc::new(config_registry),
            assemblers: Arc::new(assemblers),
            transports: Arc::new(transports),
            runtime,
        }
    }

    pub fn resolve(&self, repository: &Repository) -> Result<Packager, PackagerResolveError> {
        let cfg = self.config_registry.resolve(repository)?.clone();

        let assembler = self
            .assemblers
            .get(&cfg.assembler_id)
            .cloned()
            .ok_or_else(|| PackagerResolveError::UnknownAssembler(cfg.assembler_id.clone()))?;

        let kind = ProtocolKind::of(&cfg.protocol_binding);
        let transport = self
            .transports
            .get(&kind)
            .cloned()
            .ok_or_else(|| PackagerResolveError::UnknownTransport(cfg.repository_key.clone()))?;

        let transport_options = TransportOptions {
            protocol: cfg.protocol_binding.clone(),
            connect_timeout_ms: self.runtime.connect_timeout_ms,
            read_timeout_ms: self.runtime.read_timeout_ms,
            user_agent: self.runtime.user_agent.clone(),
        };

        Ok(Packager { assembler, transport, cfg, transport_options })
    }
}
