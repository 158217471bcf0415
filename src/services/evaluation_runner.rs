//! Evaluation runner.
//!
//! Drives one job from `Pending` to a terminal state: resolves the selection,
//! scores every applicable metric of every conversation in order, appends
//! the results and reports progress to the [`JobStore`].

use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::{EvaluationError, EvaluationResult};
use crate::domain::models::{
    Conversation, EvaluationJob, EvaluationRecord, JobStatus, MetricDefinition, MetricValue,
    ProgressDelta,
};
use crate::domain::ports::{ConversationSource, EvaluationSink, ScoringClient};
use crate::services::job_store::JobStore;
use crate::services::metric_catalog::{CatalogSource, MetricCatalog};
use crate::services::retry::RetryPolicy;
use crate::services::selection_query::SelectionQueryBuilder;

/// Conversations between two progress log lines.
const PROGRESS_LOG_INTERVAL: u64 = 25;

/// Per-conversation tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ConversationOutcome {
    records_written: u64,
    metric_failures: u64,
}

/// Orchestration loop for evaluation jobs.
pub struct EvaluationRunner {
    store: JobStore,
    queries: SelectionQueryBuilder,
    catalog: CatalogSource,
    source: Arc<dyn ConversationSource>,
    scorer: Arc<dyn ScoringClient>,
    sink: Arc<dyn EvaluationSink>,
    retry: RetryPolicy,
}

impl EvaluationRunner {
    /// Runner with the default retry policy and query builder.
    pub fn new(
        store: JobStore,
        catalog: CatalogSource,
        source: Arc<dyn ConversationSource>,
        scorer: Arc<dyn ScoringClient>,
        sink: Arc<dyn EvaluationSink>,
    ) -> Self {
        Self {
            store,
            queries: SelectionQueryBuilder::default(),
            catalog,
            source,
            scorer,
            sink,
            retry: RetryPolicy::default(),
        }
    }

    /// Use a different selection query builder.
    pub fn with_query_builder(mut self, queries: SelectionQueryBuilder) -> Self {
        self.queries = queries;
        self
    }

    /// Use a different retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Job store the runner reports to.
    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Where the metric catalog is loaded from.
    pub fn catalog_source(&self) -> &CatalogSource {
        &self.catalog
    }

    /// Run a job to a terminal state and return that state.
    ///
    /// A job stopped before the runner picked it up is left as is.
    /// Failures after start are recorded on the job, not returned.
    pub async fn run(&self, job_id: Uuid) -> EvaluationResult<JobStatus> {
        let job = match self.store.start(job_id).await {
            Ok(job) => job,
            Err(EvaluationError::InvalidTransition { from, .. }) if from.is_terminal() => {
                info!(job_id = %job_id, status = %from, "job already finished before start");
                return Ok(from);
            }
            Err(e) => return Err(e),
        };

        info!(
            job_id = %job_id,
            scorer = self.scorer.name(),
            time_window_days = job.parameters.time_window_days,
            recompute = job.parameters.recompute,
            dry_run = job.parameters.dry_run,
            "evaluation job started"
        );

        match self.drive(&job).await {
            Ok(status) => Ok(status),
            Err(err) => {
                warn!(job_id = %job_id, error = %err, "evaluation job failed");
                match self.store.fail(job_id, err.to_string()).await {
                    Ok(job) => Ok(job.status),
                    Err(EvaluationError::InvalidTransition { from, .. }) => Ok(from),
                    Err(e) => Err(e),
                }
            }
        }
    }

    async fn drive(&self, job: &EvaluationJob) -> EvaluationResult<JobStatus> {
        let job_id = job.id;
        let catalog = self.catalog.load().await?;
        let query = self
            .queries
            .build(job.parameters.time_window_days, job.parameters.recompute);
        debug!(job_id = %job_id, sql = %query, "resolving selection query");

        let batch = self.source.resolve(&query).await?;
        self.store.set_total(job_id, batch.total).await?;
        info!(
            job_id = %job_id,
            total_conversations = batch.total,
            metrics = catalog.len(),
            "selection resolved"
        );

        let mut conversations = batch.conversations;
        let mut processed = 0u64;

        loop {
            if self.store.stop_requested(job_id).await {
                let job = self.store.mark_stopped(job_id).await?;
                info!(
                    job_id = %job_id,
                    processed_conversations = job.processed_conversations,
                    "evaluation job stopped"
                );
                return Ok(job.status);
            }

            let Some(next) = conversations.next().await else {
                break;
            };
            let conversation = next?;

            let outcome = self
                .evaluate_conversation(job, &catalog, &conversation)
                .await;
            self.store
                .record_progress(
                    job_id,
                    ProgressDelta::conversation(outcome.records_written, outcome.metric_failures),
                )
                .await?;

            processed += 1;
            if processed % PROGRESS_LOG_INTERVAL == 0 {
                info!(
                    job_id = %job_id,
                    processed_conversations = processed,
                    total_conversations = batch.total,
                    "evaluation progress"
                );
            }
        }

        let job = self.store.complete(job_id).await?;
        info!(
            job_id = %job_id,
            processed_conversations = job.processed_conversations,
            failed_conversations = job.failed_conversations,
            records_written = job.records_written,
            metric_failures = job.metric_failures,
            "evaluation job completed"
        );
        Ok(job.status)
    }

    /// Score every applicable metric. Metric failures are tallied, never raised.
    async fn evaluate_conversation(
        &self,
        job: &EvaluationJob,
        catalog: &MetricCatalog,
        conversation: &Conversation,
    ) -> ConversationOutcome {
        let mut outcome = ConversationOutcome::default();

        for metric in catalog.applicable_to(&conversation.agent_id) {
            match self.evaluate_metric(job, metric, conversation).await {
                Ok(written) => outcome.records_written += u64::from(written),
                Err(err) => {
                    warn!(
                        job_id = %job.id,
                        session_id = %conversation.session_id,
                        agent_id = %conversation.agent_id,
                        metric = %metric.name,
                        error = %err,
                        "skipping metric after retries"
                    );
                    outcome.metric_failures += 1;
                }
            }
        }

        outcome
    }

    /// Score, validate and append one metric. Returns whether a record was written.
    async fn evaluate_metric(
        &self,
        job: &EvaluationJob,
        metric: &MetricDefinition,
        conversation: &Conversation,
    ) -> EvaluationResult<bool> {
        let scorer = self.scorer.as_ref();
        let prompt = metric.prompt.as_str();
        let turns = conversation.turns.as_slice();
        let value_type = metric.value_type;

        let value = self
            .retry
            .execute("score", move || async move {
                let score = scorer.score(prompt, turns).await?;
                MetricValue::from_score(value_type, score).map_err(EvaluationError::ScoringFailure)
            })
            .await?;

        if job.parameters.dry_run {
            debug!(
                job_id = %job.id,
                session_id = %conversation.session_id,
                metric = %metric.name,
                value = ?value,
                "dry run, record not appended"
            );
            return Ok(false);
        }

        let sink = self.sink.as_ref();
        let agent_id = conversation.agent_id.as_str();
        let session_id = conversation.session_id.as_str();
        let value = &value;
        self.retry
            .execute("append", move || {
                // each attempt is stamped at its own write time
                let record = EvaluationRecord::now(agent_id, session_id, metric, value.clone());
                async move { sink.append(&record).await }
            })
            .await?;

        debug!(
            job_id = %job.id,
            session_id = %conversation.session_id,
            metric = %metric.name,
            "evaluation record appended"
        );
        Ok(true)
    }
}
