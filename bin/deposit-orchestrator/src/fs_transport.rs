//! A [`Transport`] that writes packages to a local directory instead of
//! sending them anywhere — the dev-mode stand-in for the FTP/SWORDv2
//! clients a production deployment would register instead.
//!
//! Every repository bound to [`ProtocolBinding::Filesystem`] shares this
//! one transport; `base_dir`/`overwrite`/`create_if_missing` come from the
//! [`TransportOptions`] passed to `open`, exactly as a real transport would
//! read its connection parameters from there.

use std::path::PathBuf;

use async_trait::async_trait;
use deposit_collaborators::{Session, Transport, TransportError, TransportOptions, TransportResponse};
use deposit_primitives::ProtocolBinding;
use tokio::io::{AsyncRead, AsyncReadExt};

#[derive(Debug, Default)]
pub struct FilesystemTransport;

struct FilesystemSession {
    base_dir: PathBuf,
    overwrite: bool,
}

#[async_trait]
impl Transport for FilesystemTransport {
    async fn open(&self, options: &TransportOptions) -> Result<Box<dyn Session>, TransportError> {
        let (base_dir, overwrite, create_if_missing) = match &options.protocol {
            ProtocolBinding::Filesystem { base_dir, overwrite, create_if_missing } => {
                (PathBuf::from(base_dir), *overwrite, *create_if_missing)
            }
            other => return Err(TransportError::OpenFailed(format!("unsupported protocol binding: {other:?}"))),
        };

        if create_if_missing {
            std::fs::create_dir_all(&base_dir).map_err(|err| TransportError::OpenFailed(err.to_string()))?;
        } else if !base_dir.is_dir() {
            return Err(TransportError::OpenFailed(format!("{} does not exist", base_dir.display())));
        }

        Ok(Box::new(FilesystemSession { base_dir, overwrite }))
    }
}

#[async_trait]
impl Session for FilesystemSession {
    async fn send(
        &mut self,
        mut stream: Box<dyn AsyncRead + Send + Unpin>,
        _options: &TransportOptions,
    ) -> Result<TransportResponse, TransportError> {
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).await.map_err(|err| TransportError::SendFailed(err.to_string()))?;

        let file_name = format!("{}.bin", uuid_like());
        let path = self.base_dir.join(file_name);

        if path.exists() && !self.overwrite {
            return Err(TransportError::SendFailed(format!("{} already exists", path.display())));
        }

        std::fs::write(&path, &bytes).map_err(|err| TransportError::SendFailed(err.to_string()))?;
        Ok(TransportResponse::opaque_success())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// A filename-safe unique token. Not a real UUID — this adapter has no
/// dependency on a UUID crate of its own and `deposit_primitives::ResourceId`
/// already wraps one, so a new deposit's package files are just named after
/// a fresh `ResourceId`.
fn uuid_like() -> String {
    deposit_primitives::ResourceId::new().to_string()
}

#[cfg(test)]
mod tests {
    use deposit_collaborators::with_session;

    use super::*;

    fn options(base_dir: &str, overwrite: bool) -> TransportOptions {
        TransportOptions {
            protocol: ProtocolBinding::Filesystem { base_dir: base_dir.to_string(), overwrite, create_if_missing: true },
            connect_timeout_ms: 1_000,
            read_timeout_ms: 1_000,
            user_agent: "test".into(),
        }
    }

    #[tokio::test]
    async fn sent_package_is_written_under_base_dir() {
        let dir = std::env::temp_dir().join(format!("deposit-orchestrator-fs-transport-{}", deposit_primitives::ResourceId::new()));
        let transport = FilesystemTransport;
        let opts = options(dir.to_str().unwrap(), false);

        let result: Result<(), TransportError> = with_session(&transport, &opts, |mut session| async move {
            let outcome = session.send(Box::new(std::io::Cursor::new(b"payload".to_vec())), &opts).await.map(|_| ());
            (session, outcome)
        })
        .await;

        assert!(result.is_ok());
        let entries: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
