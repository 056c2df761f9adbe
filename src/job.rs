//! Background discovery runs.
//!
//! A [`DiscoveryJob`] runs one pipeline invocation on the tokio runtime and
//! publishes its status on a watch channel, so callers can poll, await or
//! cancel it without holding the pipeline future themselves.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::DiscoveryError;
use crate::pipeline::CompetitorPipeline;
use crate::profile::ClientProfile;
use crate::result::PipelineResult;

/// Lifecycle of a background run.
#[derive(Debug, Clone)]
pub enum JobStatus {
    /// The pipeline is still working.
    Running,
    /// The run finished with a result.
    Completed(Box<PipelineResult>),
    /// The run stopped on an error, carried as its message.
    Failed(String),
    /// The run was cancelled before it finished.
    Cancelled,
}

impl JobStatus {
    /// Whether the job has stopped.
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Handle to a discovery run executing in the background.
#[derive(Debug)]
pub struct DiscoveryJob {
    id: Uuid,
    cancel: CancellationToken,
    status: watch::Receiver<JobStatus>,
    handle: tokio::task::JoinHandle<()>,
}

impl DiscoveryJob {
    /// Start `profile` on `pipeline`. Must be called inside a tokio runtime.
    pub fn spawn(pipeline: Arc<CompetitorPipeline>, profile: ClientProfile) -> Self {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (tx, status) = watch::channel(JobStatus::Running);

        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let outcome = pipeline.run(&profile, token).await;
            let status = match outcome {
                Ok(result) => JobStatus::Completed(Box::new(result)),
                Err(DiscoveryError::Cancelled(reason)) => {
                    tracing::info!(job = %id, %reason, "discovery job cancelled");
                    JobStatus::Cancelled
                }
                Err(e) => {
                    tracing::warn!(job = %id, error = %e, "discovery job failed");
                    JobStatus::Failed(e.to_string())
                }
            };
            // Receivers may all be gone; nothing to report to then.
            let _ = tx.send(status);
        });

        Self {
            id,
            cancel,
            status,
            handle,
        }
    }

    /// Identifier of this job, also logged as `job` on its tracing events.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current status snapshot.
    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    /// Request cancellation. The job settles as [`JobStatus::Cancelled`]
    /// unless it already finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the job to finish and return its final status.
    pub async fn wait(mut self) -> JobStatus {
        if self.status.wait_for(JobStatus::is_finished).await.is_err() {
            // Sender dropped without a final status: the task panicked.
            return match (&mut self.handle).await {
                Err(e) if e.is_cancelled() => JobStatus::Cancelled,
                Err(e) => JobStatus::Failed(format!("discovery task panicked: {e}")),
                Ok(()) => self.status.borrow().clone(),
            };
        }
        let status = self.status.borrow().clone();
        status
    }
}

impl Drop for DiscoveryJob {
    fn drop(&mut self) {
        if !self.status.borrow().is_finished() {
            self.cancel.cancel();
        }
    }
}
