use tracing::warn;

use crate::errors::TransportError;
use crate::transport::{Session, Transport, TransportOptions};

/// Opens a session, runs `body` against it, and closes the session on every
/// exit path — normal return or the body's own error — before propagating
/// `body`'s result.
///
/// This is the scope-bound wrapper Design Notes §9 calls for in place of a
/// try/finally: `close` cannot run in a `Drop` impl because it is async, so
/// the guarantee is encoded as a function that always awaits `close` before
/// returning, rather than relying on unwinding.
pub async fn with_session<T, F, Fut>(
    transport: &dyn Transport,
    options: &TransportOptions,
    body: F,
) -> Result<T, TransportError>
where
    F: FnOnce(Box<dyn Session>) -> Fut,
    Fut: std::future::Future<Output = (Box<dyn Session>, Result<T, TransportError>)>,
{
    let session = transport.open(options).await?;
    let (mut session, result) = body(session).await;

    if let Err(close_err) = session.close().await {
        warn!(error = %close_err, "failed to close transport session");
    }

    result
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::io::AsyncRead;

    use super::*;
    use crate::transport::TransportResponse;
    use deposit_primitives::ProtocolBinding;

    #[derive(Default)]
    struct Counters {
        opened: AtomicUsize,
        closed: AtomicUsize,
    }

    struct CountingSession(Arc<Counters>);

    #[async_trait]
    impl Session for CountingSession {
        async fn send(
            &mut self,
            _stream: Box<dyn AsyncRead + Send + Unpin>,
            _options: &TransportOptions,
        ) -> Result<TransportResponse, TransportError> {
            Err(TransportError::SendFailed("injected".into()))
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.0.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct CountingTransport(Arc<Counters>);

    #[async_trait]
    impl Transport for CountingTransport {
        async fn open(&self, _options: &TransportOptions) -> Result<Box<dyn Session>, TransportError> {
            self.0.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingSession(self.0.clone())))
        }
    }

    fn sample_options() -> TransportOptions {
        TransportOptions {
            protocol: ProtocolBinding::Filesystem {
                base_dir: "/tmp".into(),
                overwrite: false,
                create_if_missing: true,
            },
            connect_timeout_ms: 1_000,
            read_timeout_ms: 1_000,
            user_agent: "test".into(),
        }
    }

    #[tokio::test]
    async fn session_is_closed_even_when_send_fails() {
        let counters = Arc::new(Counters::default());
        let transport = CountingTransport(counters.clone());
        let options = sample_options();

        let result: Result<(), TransportError> = with_session(&transport, &options, |mut session| async move {
            let send_result = session
                .send(Box::new(tokio::io::empty()), &options)
                .await
                .map(|_| ());
            (session, send_result)
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }
}
