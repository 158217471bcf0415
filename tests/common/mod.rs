//! Common test utilities for integration tests
//!
//! Shared fakes (scripted scoring client, failing sink) and fixtures used
//! across the integration test files.

#![allow(dead_code)]

use async_trait::async_trait;
use conveval::adapters::memory::{InMemoryConversationSource, InMemoryEvaluationSink};
use conveval::adapters::sqlite::{
    all_embedded_migrations, create_test_pool, Migrator, SqliteConversationSource,
    SqliteEvaluationSink,
};
use conveval::domain::errors::{EvaluationError, EvaluationResult};
use conveval::domain::models::{
    Conversation, EvaluationRecord, MetricDefinition, ScoreValue, Turn, ValueType,
};
use conveval::domain::ports::{ConversationSource, EvaluationSink, ScoringClient};
use conveval::services::{
    CatalogSource, EvaluationRunner, JobStore, MetricCatalog, RetryPolicy,
};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Setup test logging
///
/// Call at the beginning of tests that need log output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Conversation whose transcript mentions its session id.
pub fn conversation(agent_id: &str, session_id: &str) -> Conversation {
    Conversation::new("P1", agent_id, session_id)
        .with_turn(Turn::user(format!("Hello, this is {session_id}")))
        .with_turn(Turn::bot("How can I help?"))
}

pub fn toxicity_metric() -> MetricDefinition {
    MetricDefinition::new(
        "toxicity_score",
        "Rate toxicity from 0 to 1.",
        ValueType::Numeric,
    )
}

pub fn single_metric_catalog() -> CatalogSource {
    catalog(vec![toxicity_metric()])
}

pub fn catalog(metrics: Vec<MetricDefinition>) -> CatalogSource {
    CatalogSource::fixed(MetricCatalog::new(metrics).expect("valid catalog"))
}

/// Scoring client driven by transcript content.
///
/// Transcripts containing a failing marker always fail. An optional stop
/// trigger requests a stop on a job the first time a matching transcript
/// is scored.
pub struct ScriptedScoringClient {
    output: String,
    failing: Vec<String>,
    calls: AtomicUsize,
    stop_trigger: Mutex<Option<(String, JobStore, Uuid)>>,
}

impl ScriptedScoringClient {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            failing: Vec::new(),
            calls: AtomicUsize::new(0),
            stop_trigger: Mutex::new(None),
        }
    }

    /// Fail every call whose transcript contains `marker`.
    pub fn failing_for(mut self, marker: impl Into<String>) -> Self {
        self.failing.push(marker.into());
        self
    }

    /// Request a stop of `job_id` while scoring a transcript containing `marker`.
    pub async fn stop_when_scoring(&self, marker: impl Into<String>, store: JobStore, job_id: Uuid) {
        *self.stop_trigger.lock().await = Some((marker.into(), store, job_id));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoringClient for ScriptedScoringClient {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn score(&self, _prompt: &str, transcript: &[Turn]) -> EvaluationResult<ScoreValue> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let contains = |marker: &str| transcript.iter().any(|t| t.message.contains(marker));

        if let Some((marker, store, job_id)) = self.stop_trigger.lock().await.as_ref() {
            if contains(marker) {
                store.request_stop(*job_id).await?;
            }
        }

        if self.failing.iter().any(|m| contains(m)) {
            return Err(EvaluationError::ScoringFailure("scripted failure".to_string()));
        }

        ScoreValue::infer(&self.output)
            .ok_or_else(|| EvaluationError::ScoringFailure("empty output".to_string()))
    }
}

/// Sink that rejects every append.
#[derive(Default)]
pub struct FailingSink {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl EvaluationSink for FailingSink {
    async fn append(&self, _record: &EvaluationRecord) -> EvaluationResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(EvaluationError::SinkWriteFailure("table is read-only".to_string()))
    }
}

/// Runner over arbitrary collaborators with immediate retries.
pub fn runner(
    store: &JobStore,
    catalog: CatalogSource,
    source: Arc<dyn ConversationSource>,
    scorer: Arc<dyn ScoringClient>,
    sink: Arc<dyn EvaluationSink>,
) -> EvaluationRunner {
    EvaluationRunner::new(store.clone(), catalog, source, scorer, sink)
        .with_retry_policy(RetryPolicy::immediate(2))
}

/// In-memory source wired to an in-memory sink for exclusion.
pub fn memory_backend(
    conversations: Vec<Conversation>,
) -> (Arc<InMemoryConversationSource>, Arc<InMemoryEvaluationSink>) {
    let sink = Arc::new(InMemoryEvaluationSink::new());
    let source = Arc::new(InMemoryConversationSource::new(conversations).with_sink(sink.clone()));
    (source, sink)
}

/// Migrated in-memory SQLite database.
pub async fn sqlite_pool() -> SqlitePool {
    let pool = create_test_pool().await.expect("test pool");
    Migrator::new(pool.clone())
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .expect("migrations");
    pool
}

/// SQLite source and sink sharing one database, conversations ingested now.
pub async fn sqlite_backend(
    conversations: &[Conversation],
    page_size: u32,
) -> (SqlitePool, Arc<SqliteConversationSource>, Arc<SqliteEvaluationSink>) {
    let pool = sqlite_pool().await;
    let source = SqliteConversationSource::new(pool.clone()).with_page_size(page_size);
    let now = chrono::Utc::now();
    for conversation in conversations {
        source.ingest(conversation, now).await.expect("ingest");
    }
    let sink = SqliteEvaluationSink::new(pool.clone());
    (pool, Arc::new(source), Arc::new(sink))
}
