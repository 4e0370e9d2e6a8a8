use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::db::repository::DocumentRepository;
use crate::propagation::{propagate_section_renumbering, PropagationJob};

/// Sending half of the propagation queue.
///
/// Cheap to clone; the save flow holds one and never waits on the worker.
#[derive(Debug, Clone)]
pub struct PropagationQueue {
    tx: mpsc::Sender<PropagationJob>,
}

impl PropagationQueue {
    /// Create a bounded queue. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PropagationJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Create a queue and spawn its worker on the current runtime.
    ///
    /// The worker exits once every clone of the returned queue is dropped
    /// and the remaining jobs are drained.
    pub fn start(
        repo: Arc<dyn DocumentRepository>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (queue, rx) = Self::new(capacity);
        let handle = tokio::spawn(run_worker(repo, rx));
        (queue, handle)
    }

    /// Queue a job without waiting. Returns `false` if it was dropped.
    ///
    /// A full or closed queue is logged; the caller's save is not affected.
    pub fn enqueue(&self, job: PropagationJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                tracing::warn!(
                    "Propagation queue full, dropping job for document {}",
                    job.document_id
                );
                false
            }
            Err(TrySendError::Closed(job)) => {
                tracing::error!(
                    "Propagation queue closed (worker dead?), dropping job for document {}",
                    job.document_id
                );
                false
            }
        }
    }
}

/// Background worker that processes the propagation queue, one job at a time.
pub async fn run_worker(
    repo: Arc<dyn DocumentRepository>,
    mut rx: mpsc::Receiver<PropagationJob>,
) {
    tracing::info!("Propagation worker started");
    while let Some(job) = rx.recv().await {
        match propagate_section_renumbering(
            repo.as_ref(),
            job.document_id,
            &job.old_content,
            &job.new_content,
        )
        .await
        {
            Ok(report) if !report.failed.is_empty() => tracing::warn!(
                "Section links of document {} only partially propagated: failed for {:?}",
                job.document_id,
                report.failed
            ),
            Ok(_) => {}
            Err(e) => tracing::error!(
                "Failed to propagate section changes of document {}: {}",
                job.document_id,
                e
            ),
        }
    }
    tracing::info!("Propagation worker stopped");
}
