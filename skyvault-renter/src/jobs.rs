//! Asynchronous download jobs
//!
//! A job moves through `Pending -> InProgress -> {Completed, Failed}` and
//! never leaves a terminal state. Only the job's own task writes the status,
//! except `cancel`, which may settle a job that has not started yet.
//! Waiters subscribe to a `watch` channel and read the stored outcome, so
//! waiting any number of times never re-runs the download.

use crate::download::DownloadOrchestrator;
use crate::error::{RenterError, Result};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use skyvault_core::FileManifest;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of a successful download job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub destination: PathBuf,
    pub bytes_written: u64,
    pub finished_at: DateTime<Utc>,
}

/// Download job state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    Pending,
    InProgress,
    Completed(DownloadReport),
    Failed(RenterError),
}

impl DownloadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadStatus::Completed(_) | DownloadStatus::Failed(_))
    }

    fn can_become(&self, next: &DownloadStatus) -> bool {
        matches!(
            (self, next),
            (DownloadStatus::Pending, DownloadStatus::InProgress)
                | (DownloadStatus::Pending, DownloadStatus::Failed(_))
                | (DownloadStatus::InProgress, DownloadStatus::Completed(_))
                | (DownloadStatus::InProgress, DownloadStatus::Failed(_))
        )
    }
}

struct DownloadJob {
    id: Uuid,
    file_id: Uuid,
    destination: PathBuf,
    status: watch::Sender<DownloadStatus>,
    cancel: CancellationToken,
    observed: AtomicBool,
    finished_at: Mutex<Option<Instant>>,
}

impl DownloadJob {
    /// Apply `next` if the state machine allows it
    fn transition(&self, next: DownloadStatus) -> bool {
        let terminal = next.is_terminal();
        let applied = self.status.send_if_modified(|current| {
            if current.can_become(&next) {
                *current = next;
                true
            } else {
                false
            }
        });
        if applied && terminal {
            *self.finished_at.lock() = Some(Instant::now());
        }
        applied
    }

    fn settle_if_pending(&self, next: DownloadStatus) -> bool {
        let applied = self.status.send_if_modified(|current| {
            if *current == DownloadStatus::Pending && current.can_become(&next) {
                *current = next;
                true
            } else {
                false
            }
        });
        if applied && self.status.borrow().is_terminal() {
            *self.finished_at.lock() = Some(Instant::now());
        }
        applied
    }

    fn is_garbage(&self, retention: Duration) -> bool {
        if !self.status.borrow().is_terminal() {
            return false;
        }
        if self.observed.load(Ordering::Acquire) {
            return true;
        }
        self.finished_at
            .lock()
            .is_some_and(|at| at.elapsed() >= retention)
    }
}

/// Handle to a download job; cheap to clone
#[derive(Clone)]
pub struct DownloadHandle {
    job: Arc<DownloadJob>,
}

impl DownloadHandle {
    /// Create a `Pending` job and start its task
    pub fn spawn(
        orchestrator: Arc<DownloadOrchestrator>,
        manifest: FileManifest,
        destination: PathBuf,
    ) -> Self {
        let (status, _) = watch::channel(DownloadStatus::Pending);
        let job = Arc::new(DownloadJob {
            id: Uuid::new_v4(),
            file_id: manifest.file_id,
            destination,
            status,
            cancel: CancellationToken::new(),
            observed: AtomicBool::new(false),
            finished_at: Mutex::new(None),
        });

        tokio::spawn(run_job(job.clone(), orchestrator, manifest));
        debug!(job_id = %job.id, file_id = %job.file_id, "Download job created");
        Self { job }
    }

    pub fn id(&self) -> Uuid {
        self.job.id
    }

    pub fn file_id(&self) -> Uuid {
        self.job.file_id
    }

    pub fn destination(&self) -> &PathBuf {
        &self.job.destination
    }

    pub fn status(&self) -> DownloadStatus {
        self.job.status.borrow().clone()
    }

    /// Wait until the job is terminal and return its stored outcome
    pub async fn wait(&self) -> Result<DownloadReport> {
        let mut rx = self.job.status.subscribe();
        let outcome = {
            let status = rx
                .wait_for(DownloadStatus::is_terminal)
                .await
                .map_err(|_| RenterError::Core("download job dropped".into()))?;
            match &*status {
                DownloadStatus::Completed(report) => Ok(report.clone()),
                DownloadStatus::Failed(e) => Err(e.clone()),
                _ => Err(RenterError::Core("download job not terminal".into())),
            }
        };
        self.job.observed.store(true, Ordering::Release);
        outcome
    }

    /// Stop the job; it settles in `Failed(Cancelled)` unless already terminal
    ///
    /// A running job observes the token in its fetch tasks and settles
    /// itself; a job that has not started is settled here.
    pub fn cancel(&self) {
        self.job.cancel.cancel();
        if self.job.settle_if_pending(DownloadStatus::Failed(RenterError::Cancelled)) {
            info!(job_id = %self.job.id, "Download job cancelled before start");
        }
    }
}

impl std::fmt::Debug for DownloadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadHandle")
            .field("id", &self.job.id)
            .field("file_id", &self.job.file_id)
            .field("status", &*self.job.status.borrow())
            .finish()
    }
}

async fn run_job(
    job: Arc<DownloadJob>,
    orchestrator: Arc<DownloadOrchestrator>,
    manifest: FileManifest,
) {
    if !job.transition(DownloadStatus::InProgress) {
        return;
    }

    let outcome = match orchestrator
        .download_to_path(&manifest, &job.destination, job.cancel.clone())
        .await
    {
        Ok(bytes_written) => DownloadStatus::Completed(DownloadReport {
            destination: job.destination.clone(),
            bytes_written,
            finished_at: Utc::now(),
        }),
        Err(e) => {
            warn!(job_id = %job.id, error = %e, "Download job failed");
            DownloadStatus::Failed(e)
        }
    };

    let completed = matches!(outcome, DownloadStatus::Completed(_));
    if job.transition(outcome) && completed {
        info!(job_id = %job.id, destination = %job.destination.display(), "Download job completed");
    }
}

/// Download jobs by ID
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, DownloadHandle>>,
    retention: Duration,
}

impl JobRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            retention,
        }
    }

    pub fn insert(&self, handle: DownloadHandle) {
        self.jobs.write().insert(handle.id(), handle);
    }

    pub fn get(&self, id: Uuid) -> Option<DownloadHandle> {
        self.jobs.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// Wait for job `id` to finish
    pub async fn wait(&self, id: Uuid) -> Result<DownloadReport> {
        let handle = self.get(id).ok_or(RenterError::JobNotFound(id))?;
        handle.wait().await
    }

    /// Cancel job `id`
    pub fn cancel(&self, id: Uuid) -> Result<()> {
        let handle = self.get(id).ok_or(RenterError::JobNotFound(id))?;
        handle.cancel();
        Ok(())
    }

    /// Drop finished jobs whose outcome was observed or whose retention
    /// window has passed; returns how many were removed
    pub fn prune(&self) -> usize {
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, handle| !handle.job.is_garbage(self.retention));
        let removed = before - jobs.len();
        if removed > 0 {
            debug!(removed, remaining = jobs.len(), "Pruned download jobs");
        }
        removed
    }
}
