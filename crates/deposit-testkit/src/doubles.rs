use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use deposit_collaborators::{
    Assembler, AssembleError, BuildError, DepositSubmissionBuilder, PackageMeta, PackageStream, Session, Transport,
    TransportError, TransportOptions, TransportResponse,
};
use deposit_primitives::{AssemblerOptions, DepositFile, DepositSubmission, Submission};
use tokio::io::AsyncRead;

/// Projects a [`Submission`]'s own `files`/`metadata`/persons straight
/// through into a [`DepositSubmission`] — no manuscript/journal/article
/// lookups, since the test doubles have nothing to look those up in.
#[derive(Debug, Default)]
pub struct FakeSubmissionBuilder;

#[async_trait]
impl DepositSubmissionBuilder for FakeSubmissionBuilder {
    async fn build(&self, submission: &Submission) -> Result<DepositSubmission, BuildError> {
        let files = submission
            .files
            .iter()
            .map(|f| DepositFile { name: f.name.clone(), content_location: f.location.clone(), role: f.role.clone() })
            .collect();

        Ok(DepositSubmission {
            submission_id: submission.id.clone(),
            files,
            persons: submission.metadata.persons.clone(),
            metadata: submission.metadata.clone(),
        })
    }
}

/// Always fails to build the projection, for exercising the precheck
/// postcheck failure path.
#[derive(Debug, Default)]
pub struct FailingSubmissionBuilder;

#[async_trait]
impl DepositSubmissionBuilder for FailingSubmissionBuilder {
    async fn build(&self, _submission: &Submission) -> Result<DepositSubmission, BuildError> {
        Err(BuildError::Failed("injected builder failure".into()))
    }
}

/// Always succeeds, producing a one-byte package stream. Grounded on the
/// teacher's pattern of tiny fixed-output stand-ins for collaborator
/// interfaces under test.
#[derive(Debug, Default)]
pub struct FakeAssembler;

#[async_trait]
impl Assembler for FakeAssembler {
    async fn assemble(
        &self,
        deposit_submission: &DepositSubmission,
        options: &AssemblerOptions,
    ) -> Result<PackageStream, AssembleError> {
        if deposit_submission.files.is_empty() {
            return Err(AssembleError::Failed("no files to package".into()));
        }

        let meta = PackageMeta {
            archive: options.archive.clone(),
            compression: options.compression.clone(),
            checksum_algorithms: options.checksum_algorithms.clone(),
        };
        Ok(PackageStream::new(meta, Box::new(std::io::Cursor::new(vec![0u8]))))
    }
}

/// Always fails to assemble. Used to exercise the Phase A failure path
/// without needing a transport double at all.
#[derive(Debug, Default)]
pub struct FailingAssembler;

#[async_trait]
impl Assembler for FailingAssembler {
    async fn assemble(
        &self,
        _deposit_submission: &DepositSubmission,
        _options: &AssemblerOptions,
    ) -> Result<PackageStream, AssembleError> {
        Err(AssembleError::Failed("injected assembler failure".into()))
    }
}

/// What a [`ScriptedTransport`] should hand back from `send`, and how many
/// times `open`/`close` have been observed — used to drive S1-S4 and
/// Testable Property 7 (session scope).
#[derive(Debug, Default)]
pub struct TransportCounters {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub sends: AtomicUsize,
}

#[derive(Debug, Clone)]
pub enum ScriptedSend {
    Opaque,
    Sword { alternate_link: String, atom_statement_link: String },
    Fail(String),
}

/// A [`Transport`] whose `send` outcome is fixed in advance. Every `open`
/// and `close` is counted so tests can assert the scoped-session guarantee
/// holds even when `send` fails.
pub struct ScriptedTransport {
    pub outcome: ScriptedSend,
    pub counters: std::sync::Arc<TransportCounters>,
}

impl ScriptedTransport {
    pub fn new(outcome: ScriptedSend) -> Self {
        Self { outcome, counters: std::sync::Arc::new(TransportCounters::default()) }
    }
}

struct ScriptedSession {
    outcome: ScriptedSend,
    counters: std::sync::Arc<TransportCounters>,
}

#[async_trait]
impl Session for ScriptedSession {
    async fn send(
        &mut self,
        mut stream: Box<dyn AsyncRead + Send + Unpin>,
        _options: &TransportOptions,
    ) -> Result<TransportResponse, TransportError> {
        use tokio::io::AsyncReadExt;

        self.counters.sends.fetch_add(1, Ordering::SeqCst);
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.map_err(|err| TransportError::SendFailed(err.to_string()))?;

        match &self.outcome {
            ScriptedSend::Opaque => Ok(TransportResponse::opaque_success()),
            ScriptedSend::Sword { alternate_link, atom_statement_link } => {
                Ok(TransportResponse::sword_success(alternate_link.clone(), atom_statement_link.clone()))
            }
            ScriptedSend::Fail(reason) => Err(TransportError::SendFailed(reason.clone())),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, _options: &TransportOptions) -> Result<Box<dyn Session>, TransportError> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession { outcome: self.outcome.clone(), counters: self.counters.clone() }))
    }
}

/// An in-memory mailbox [`MessageBus`](deposit_collaborators::MessageBus)
/// double: events are pushed by the test, drained in FIFO order, and acked
/// events are recorded for assertions.
#[derive(Debug, Default)]
pub struct FakeMessageBus {
    queue: Mutex<std::collections::VecDeque<deposit_collaborators::TriggerEvent>>,
    acked: Mutex<Vec<String>>,
}

impl FakeMessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: deposit_collaborators::TriggerEvent) {
        self.queue.lock().expect("mailbox lock poisoned").push_back(event);
    }

    pub fn acked_tags(&self) -> Vec<String> {
        self.acked.lock().expect("mailbox lock poisoned").clone()
    }
}

#[async_trait]
impl deposit_collaborators::MessageBus for FakeMessageBus {
    async fn recv(&self) -> Result<deposit_collaborators::TriggerEvent, deposit_collaborators::BusError> {
        self.queue
            .lock()
            .expect("mailbox lock poisoned")
            .pop_front()
            .ok_or_else(|| deposit_collaborators::BusError::Io("no events queued".into()))
    }

    async fn ack(&self, event: &deposit_collaborators::TriggerEvent) -> Result<(), deposit_collaborators::BusError> {
        self.acked.lock().expect("mailbox lock poisoned").push(event.delivery_tag().to_string());
        Ok(())
    }
}
