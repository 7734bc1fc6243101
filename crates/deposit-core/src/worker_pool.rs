use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::errors::PoolRejected;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A bounded worker pool (C9, §4.8): a fixed number of workers pulling from
/// a bounded backing queue. `submit` never blocks — a full queue is an
/// immediate rejection the caller must report, not backpressure to wait
/// out, since the caller is itself holding a critical-interaction lock
/// (§5: "none of these suspension points hold a process-wide lock" — this
/// is why submission never awaits queue space).
pub struct WorkerPool {
    tx: mpsc::Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    shutdown_grace: Duration,
}

impl WorkerPool {
    /// `queue_capacity` is typically `2 * workers` (§4.8).
    pub fn new(workers: usize, queue_capacity: usize, shutdown_grace: Duration) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(queue_capacity);
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers)
            .map(|index| {
                let rx = rx.clone();
                tokio::spawn(async move { worker_loop(index, rx).await })
            })
            .collect();

        Self { tx, workers: handles, shutdown_grace }
    }

    /// Enqueues `job`. Returns [`PoolRejected`] if the backing queue is
    /// full; the caller is expected to report this to the failure channel
    /// so the deposit is retried on a later pass (§8 Testable Property 8).
    pub fn submit(
        &self,
        label: impl Into<String>,
        job: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), PoolRejected> {
        self.tx.try_send(Box::pin(job)).map_err(|_| PoolRejected(label.into()))
    }

    /// Closes the queue and waits up to the configured grace period for
    /// in-flight workers to drain. Work still sitting in the queue (never
    /// picked up by a worker) is dropped without running; the deposits it
    /// represents remain dirty and are picked up by a future pass.
    pub async fn shutdown(self) {
        drop(self.tx);

        let join_all = futures::future::join_all(self.workers);
        if tokio::time::timeout(self.shutdown_grace, join_all).await.is_err() {
            warn!(
                grace_ms = self.shutdown_grace.as_millis() as u64,
                "worker pool shutdown grace period elapsed; remaining workers abandoned"
            );
        } else {
            info!("worker pool drained cleanly");
        }
    }
}

async fn worker_loop(index: usize, rx: Arc<Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let job = { rx.lock().await.recv().await };
        match job {
            Some(job) => job.await,
            None => {
                info!(worker = index, "worker pool channel closed, exiting");
                return;
            }
        }
    }
}
