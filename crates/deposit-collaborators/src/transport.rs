use async_trait::async_trait;
use deposit_primitives::ProtocolBinding;
use tokio::io::AsyncRead;

use crate::errors::TransportError;

/// The options a concrete [`Transport`] recognizes, projected from a
/// [`RepositoryConfig`](deposit_primitives::RepositoryConfig) — the
/// replacement for the source's `asProperties()` grab-bag.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub protocol: ProtocolBinding,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub user_agent: String,
}

/// The receipt a transport hands back after a successful send.
#[derive(Debug, Clone)]
pub enum Receipt {
    /// Fire-and-forget transports (e.g. plain FTP) report nothing further.
    Opaque,
    /// SWORDv2-style transports report an item link and a statement link.
    Sword {
        alternate_link: String,
        atom_statement_link: String,
    },
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub success: bool,
    pub error: Option<String>,
    pub receipt: Option<Receipt>,
}

impl TransportResponse {
    pub fn opaque_success() -> Self {
        Self { success: true, error: None, receipt: Some(Receipt::Opaque) }
    }

    pub fn sword_success(alternate_link: impl Into<String>, atom_statement_link: impl Into<String>) -> Self {
        Self {
            success: true,
            error: None,
            receipt: Some(Receipt::Sword {
                alternate_link: alternate_link.into(),
                atom_statement_link: atom_statement_link.into(),
            }),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()), receipt: None }
    }
}

/// A transport session, scoped to exactly one `send`. `close` must be
/// invoked on every exit path, including when `send` fails or panics; see
/// [`crate::scoped_session::with_session`] for the guaranteed-release
/// wrapper the core uses around this trait.
#[async_trait]
pub trait Session: Send {
    async fn send(
        &mut self,
        stream: Box<dyn AsyncRead + Send + Unpin>,
        options: &TransportOptions,
    ) -> Result<TransportResponse, TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens a session to a remote endpoint for a given protocol binding.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, options: &TransportOptions) -> Result<Box<dyn Session>, TransportError>;
}
