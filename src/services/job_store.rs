//! Process-local job store.
//!
//! Single source of truth for job state. Every status change goes through
//! here and is checked against the [`JobStatus`] state machine under one
//! write lock, so concurrent readers always observe a consistent snapshot.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::errors::{EvaluationError, EvaluationResult};
use crate::domain::models::{EvaluationJob, JobParameters, JobStatus, ProgressDelta};

/// Filter for listing jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Only jobs created at or after this instant
    pub created_after: Option<DateTime<Utc>>,
    /// Only jobs in this status
    pub status: Option<JobStatus>,
}

impl JobFilter {
    /// Jobs created at or after `created_after`.
    pub fn since(created_after: DateTime<Utc>) -> Self {
        Self {
            created_after: Some(created_after),
            status: None,
        }
    }

    fn matches(&self, job: &EvaluationJob) -> bool {
        self.created_after.map_or(true, |t| job.created_at >= t)
            && self.status.map_or(true, |s| job.status == s)
    }
}

/// In-memory registry of evaluation jobs, shared between the API and runners.
#[derive(Debug, Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<Uuid, EvaluationJob>>>,
}

impl JobStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending job.
    pub async fn create(&self, parameters: JobParameters) -> EvaluationResult<EvaluationJob> {
        parameters
            .validate()
            .map_err(EvaluationError::InvalidParameters)?;

        let job = EvaluationJob::new(parameters);
        self.jobs.write().await.insert(job.id, job.clone());
        debug!(job_id = %job.id, "job created");
        Ok(job)
    }

    /// Snapshot of a job.
    pub async fn get(&self, id: Uuid) -> EvaluationResult<EvaluationJob> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(EvaluationError::JobNotFound(id))
    }

    /// Jobs matching the filter, newest first.
    pub async fn list(&self, filter: &JobFilter) -> Vec<EvaluationJob> {
        let mut jobs: Vec<EvaluationJob> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| filter.matches(job))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// `Pending -> Running`.
    pub async fn start(&self, id: Uuid) -> EvaluationResult<EvaluationJob> {
        self.update(id, |job| transition(job, JobStatus::Running)).await
    }

    /// Record the conversation total once the selection query resolves.
    pub async fn set_total(&self, id: Uuid, total: u64) -> EvaluationResult<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(EvaluationError::JobNotFound(id))?;
        if job.is_terminal() {
            return Ok(());
        }
        if job.status != JobStatus::Running {
            return Err(EvaluationError::InvalidTransition {
                job_id: id,
                from: job.status,
                to: JobStatus::Running,
            });
        }
        if total < job.processed_conversations {
            return Err(EvaluationError::ProgressOverflow {
                job_id: id,
                processed: job.processed_conversations,
                total,
            });
        }
        job.total_conversations = Some(total);
        Ok(())
    }

    /// Apply counter increments from the runner.
    ///
    /// Silently ignored once the job is terminal, so a runner racing a stop
    /// cannot disturb the final counters.
    pub async fn record_progress(&self, id: Uuid, delta: ProgressDelta) -> EvaluationResult<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(EvaluationError::JobNotFound(id))?;

        if job.is_terminal() {
            debug!(job_id = %id, status = %job.status, "ignoring progress for terminal job");
            return Ok(());
        }

        if let Some(total) = job.total_conversations {
            let processed = job.processed_conversations + delta.processed;
            if processed > total {
                return Err(EvaluationError::ProgressOverflow {
                    job_id: id,
                    processed,
                    total,
                });
            }
        }

        job.apply_progress(delta);
        Ok(())
    }

    /// `Running -> Completed`.
    ///
    /// If the source delivered fewer conversations than it announced, the
    /// total is lowered to what was actually processed and the shortfall is
    /// kept in `last_error`.
    pub async fn complete(&self, id: Uuid) -> EvaluationResult<EvaluationJob> {
        self.update(id, |job| {
            transition(job, JobStatus::Completed)?;
            if let Some(total) = job.total_conversations {
                if job.processed_conversations < total {
                    warn!(
                        job_id = %job.id,
                        announced = total,
                        processed = job.processed_conversations,
                        "conversation source under-delivered, reconciling total"
                    );
                    job.last_error = Some(format!(
                        "conversation source delivered {} of {} selected conversations",
                        job.processed_conversations, total
                    ));
                    job.total_conversations = Some(job.processed_conversations);
                }
            }
            Ok(())
        })
        .await
    }

    /// `Running -> Failed`, recording the reason.
    pub async fn fail(&self, id: Uuid, reason: impl Into<String>) -> EvaluationResult<EvaluationJob> {
        let reason = reason.into();
        self.update(id, move |job| {
            transition(job, JobStatus::Failed)?;
            job.last_error = Some(reason);
            Ok(())
        })
        .await
    }

    /// Ask a job to stop.
    ///
    /// A pending job moves straight to `Stopped`; a running job only gets the
    /// flag and the runner acknowledges it between conversations. Terminal
    /// jobs are left untouched.
    pub async fn request_stop(&self, id: Uuid) -> EvaluationResult<EvaluationJob> {
        self.update(id, |job| {
            match job.status {
                JobStatus::Pending => {
                    job.stop_requested = true;
                    transition(job, JobStatus::Stopped)?;
                }
                JobStatus::Running => job.stop_requested = true,
                JobStatus::Completed | JobStatus::Failed | JobStatus::Stopped => {}
            }
            Ok(())
        })
        .await
    }

    /// Whether a stop has been requested. Unknown jobs read as stopped.
    pub async fn stop_requested(&self, id: Uuid) -> bool {
        self.jobs
            .read()
            .await
            .get(&id)
            .map_or(true, |job| job.stop_requested)
    }

    /// `Running -> Stopped`, acknowledging a stop request.
    pub async fn mark_stopped(&self, id: Uuid) -> EvaluationResult<EvaluationJob> {
        self.update(id, |job| transition(job, JobStatus::Stopped)).await
    }

    /// Number of jobs ever created.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Whether no job was created yet.
    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    async fn update<F>(&self, id: Uuid, apply: F) -> EvaluationResult<EvaluationJob>
    where
        F: FnOnce(&mut EvaluationJob) -> EvaluationResult<()>,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(EvaluationError::JobNotFound(id))?;
        apply(job)?;
        Ok(job.clone())
    }
}

fn transition(job: &mut EvaluationJob, to: JobStatus) -> EvaluationResult<()> {
    let from = job.status;
    job.transition_to(to)
        .map_err(|_| EvaluationError::InvalidTransition {
            job_id: job.id,
            from,
            to,
        })?;
    debug!(job_id = %job.id, from = %from, to = %to, "job status changed");
    Ok(())
}
