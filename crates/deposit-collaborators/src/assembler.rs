use async_trait::async_trait;
use deposit_primitives::{AssemblerOptions, DepositSubmission};
use tokio::io::AsyncRead;

use crate::errors::AssembleError;

/// Metadata describing a package as produced, independent of its bytes.
#[derive(Debug, Clone, Default)]
pub struct PackageMeta {
    pub archive: Option<String>,
    pub compression: Option<String>,
    pub checksum_algorithms: Vec<String>,
}

/// A single-shot package byte stream.
///
/// `open` takes `self` by value: once a [`PackageStream`] is opened there is
/// no way to get a second reader out of it, which is how this type encodes
/// "read exactly once" at the ownership level rather than with a runtime
/// flag.
pub struct PackageStream {
    pub meta: PackageMeta,
    body: Box<dyn AsyncRead + Send + Unpin>,
}

impl std::fmt::Debug for PackageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageStream").field("meta", &self.meta).finish()
    }
}

impl PackageStream {
    pub fn new(meta: PackageMeta, body: Box<dyn AsyncRead + Send + Unpin>) -> Self {
        Self { meta, body }
    }

    pub fn open(self) -> Box<dyn AsyncRead + Send + Unpin> {
        self.body
    }
}

/// Produces a packaged byte stream for a given packaging specification.
///
/// Must be safe to invoke concurrently from multiple worker threads: `&self`
/// (not `&mut self`) so `DepositTask` holds no mutable per-assembler state.
#[async_trait]
pub trait Assembler: Send + Sync {
    async fn assemble(
        &self,
        deposit_submission: &DepositSubmission,
        options: &AssemblerOptions,
    ) -> Result<PackageStream, AssembleError>;
}
