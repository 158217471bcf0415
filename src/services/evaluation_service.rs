//! Evaluation service.
//!
//! Entry point used by the HTTP API and the CLI. Submitting a job returns as
//! soon as the job is registered; its runner executes on a spawned task
//! keyed by job id.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::domain::errors::{EvaluationError, EvaluationResult};
use crate::domain::models::{EvaluationJob, JobParameters};
use crate::services::evaluation_runner::EvaluationRunner;
use crate::services::job_store::{JobFilter, JobStore};
use crate::services::metric_catalog::MetricCatalog;

/// Launches runners and exposes job state.
#[derive(Clone)]
pub struct EvaluationService {
    store: JobStore,
    runner: Arc<EvaluationRunner>,
    tasks: Arc<Mutex<HashMap<Uuid, JoinHandle<()>>>>,
}

impl EvaluationService {
    /// Service launching jobs on `runner`.
    pub fn new(runner: EvaluationRunner) -> Self {
        Self {
            store: runner.store().clone(),
            runner: Arc::new(runner),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Underlying job store.
    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Register a job and start its runner in the background.
    pub async fn submit(&self, parameters: JobParameters) -> EvaluationResult<EvaluationJob> {
        let job = self.store.create(parameters).await?;
        let job_id = job.id;

        let runner = Arc::clone(&self.runner);
        let span = info_span!("evaluation_job", job_id = %job_id);
        let handle = tokio::spawn(
            async move {
                if let Err(err) = runner.run(job_id).await {
                    warn!(error = %err, "runner exited with error");
                }
            }
            .instrument(span),
        );

        let mut tasks = self.tasks.lock().await;
        tasks.retain(|_, h| !h.is_finished());
        tasks.insert(job_id, handle);

        info!(job_id = %job_id, "evaluation job submitted");
        Ok(job)
    }

    /// Request a cooperative stop. Idempotent.
    pub async fn stop(&self, job_id: Uuid) -> EvaluationResult<EvaluationJob> {
        let job = self.store.request_stop(job_id).await?;
        info!(job_id = %job_id, status = %job.status, "stop requested");
        Ok(job)
    }

    /// Snapshot of a job.
    pub async fn get(&self, job_id: Uuid) -> EvaluationResult<EvaluationJob> {
        self.store.get(job_id).await
    }

    /// Jobs matching the filter, newest first.
    pub async fn list(&self, filter: &JobFilter) -> Vec<EvaluationJob> {
        self.store.list(filter).await
    }

    /// The catalog a job started now would use.
    pub async fn metrics(&self) -> EvaluationResult<Arc<MetricCatalog>> {
        self.runner.catalog_source().load().await
    }

    /// Wait for a job's runner to finish and return the final job.
    pub async fn wait(&self, job_id: Uuid) -> EvaluationResult<EvaluationJob> {
        let handle = self.tasks.lock().await.remove(&job_id);
        if let Some(handle) = handle {
            handle.await.map_err(|e| {
                EvaluationError::Database(format!("runner task for job {job_id} panicked: {e}"))
            })?;
        }
        self.store.get(job_id).await
    }

    /// Stop every unfinished job and wait for all runners.
    pub async fn shutdown(&self) {
        let handles: Vec<(Uuid, JoinHandle<()>)> = self.tasks.lock().await.drain().collect();
        if handles.is_empty() {
            return;
        }

        info!(jobs = handles.len(), "stopping running evaluation jobs");
        for (job_id, _) in &handles {
            if let Err(err) = self.store.request_stop(*job_id).await {
                warn!(job_id = %job_id, error = %err, "failed to request stop");
            }
        }
        for (job_id, handle) in handles {
            if let Err(err) = handle.await {
                warn!(job_id = %job_id, error = %err, "runner task panicked");
            }
        }
    }
}
