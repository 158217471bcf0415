//! In-process conversation source and evaluation sink.
//!
//! Used by tests and by offline runs that do not need a database. The source
//! interprets the structured criteria of a selection query instead of its SQL.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::errors::EvaluationResult;
use crate::domain::models::{Conversation, EvaluationRecord, SelectionQuery};
use crate::domain::ports::{ConversationBatch, ConversationSource, EvaluationSink};

#[derive(Debug, Clone)]
struct StoredConversation {
    conversation: Conversation,
    extracted_at: DateTime<Utc>,
}

/// Conversation source over a vector of conversations.
#[derive(Clone, Default)]
pub struct InMemoryConversationSource {
    conversations: Arc<RwLock<Vec<StoredConversation>>>,
    evaluations: Option<Arc<InMemoryEvaluationSink>>,
}

impl InMemoryConversationSource {
    /// Source whose conversations were all extracted just now.
    pub fn new(conversations: Vec<Conversation>) -> Self {
        let extracted_at = Utc::now();
        let stored = conversations
            .into_iter()
            .map(|conversation| StoredConversation {
                conversation,
                extracted_at,
            })
            .collect();
        Self {
            conversations: Arc::new(RwLock::new(stored)),
            evaluations: None,
        }
    }

    /// Exclude sessions already present in `sink` unless recomputing.
    pub fn with_sink(mut self, sink: Arc<InMemoryEvaluationSink>) -> Self {
        self.evaluations = Some(sink);
        self
    }

    /// Add a conversation extracted at `extracted_at`.
    pub async fn insert(&self, conversation: Conversation, extracted_at: DateTime<Utc>) {
        self.conversations.write().await.push(StoredConversation {
            conversation,
            extracted_at,
        });
    }
}

#[async_trait]
impl ConversationSource for InMemoryConversationSource {
    async fn resolve(&self, query: &SelectionQuery) -> EvaluationResult<ConversationBatch> {
        let criteria = query.criteria();
        let cutoff = Utc::now()
            .checked_sub_signed(Duration::days(i64::from(criteria.time_window_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let evaluated = match (&self.evaluations, criteria.recompute) {
            (Some(sink), false) => sink.evaluated_sessions().await,
            _ => HashSet::new(),
        };

        let mut selected: Vec<Conversation> = self
            .conversations
            .read()
            .await
            .iter()
            .filter(|stored| stored.extracted_at >= cutoff)
            .filter(|stored| {
                criteria
                    .agent_id
                    .as_ref()
                    .map_or(true, |agent| &stored.conversation.agent_id == agent)
            })
            .filter(|stored| !evaluated.contains(&stored.conversation.session_id))
            .map(|stored| stored.conversation.clone())
            .collect();

        selected.sort_by(|a, b| {
            (&a.session_id, &a.project_id, &a.agent_id).cmp(&(
                &b.session_id,
                &b.project_id,
                &b.agent_id,
            ))
        });

        Ok(ConversationBatch {
            total: selected.len() as u64,
            conversations: stream::iter(selected.into_iter().map(Ok)).boxed(),
        })
    }
}

/// Evaluation sink keeping records in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryEvaluationSink {
    records: RwLock<Vec<EvaluationRecord>>,
}

impl InMemoryEvaluationSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record in insertion order.
    pub async fn records(&self) -> Vec<EvaluationRecord> {
        self.records.read().await.clone()
    }

    /// History for a session and metric, oldest first.
    pub async fn records_for(&self, session_id: &str, metric: &str) -> Vec<EvaluationRecord> {
        let mut history: Vec<EvaluationRecord> = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.session_id == session_id && r.metric == metric)
            .cloned()
            .collect();
        history.sort_by_key(|r| r.timestamp);
        history
    }

    /// The record with the latest timestamp for a session and metric.
    pub async fn current_value(&self, session_id: &str, metric: &str) -> Option<EvaluationRecord> {
        self.records_for(session_id, metric).await.pop()
    }

    /// Sessions with at least one record.
    pub async fn evaluated_sessions(&self) -> HashSet<String> {
        self.records
            .read()
            .await
            .iter()
            .map(|r| r.session_id.clone())
            .collect()
    }
}

#[async_trait]
impl EvaluationSink for InMemoryEvaluationSink {
    async fn append(&self, record: &EvaluationRecord) -> EvaluationResult<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::MetricValue;
    use crate::services::{build_selection_query, SelectionQueryBuilder};
    use futures::TryStreamExt;

    async fn sessions(source: &InMemoryConversationSource, query: &SelectionQuery) -> Vec<String> {
        let batch = source.resolve(query).await.unwrap();
        let conversations: Vec<Conversation> = batch.conversations.try_collect().await.unwrap();
        assert_eq!(conversations.len() as u64, batch.total);
        conversations.into_iter().map(|c| c.session_id).collect()
    }

    #[tokio::test]
    async fn test_orders_by_session_and_applies_window() {
        let source = InMemoryConversationSource::new(vec![
            Conversation::new("P1", "A1", "S2"),
            Conversation::new("P1", "A1", "S1"),
        ]);
        source
            .insert(Conversation::new("P1", "A1", "S0"), Utc::now() - Duration::days(10))
            .await;

        assert_eq!(sessions(&source, &build_selection_query(7, true)).await, vec!["S1", "S2"]);
        assert_eq!(
            sessions(&source, &build_selection_query(30, true)).await,
            vec!["S0", "S1", "S2"]
        );
    }

    #[tokio::test]
    async fn test_maximum_window_selects_everything() {
        let source = InMemoryConversationSource::new(vec![Conversation::new("P1", "A1", "S1")]);
        source
            .insert(Conversation::new("P1", "A1", "S0"), Utc::now() - Duration::days(36_500))
            .await;

        assert_eq!(
            sessions(&source, &build_selection_query(u32::MAX, true)).await,
            vec!["S0", "S1"]
        );
    }

    #[tokio::test]
    async fn test_excludes_evaluated_sessions_unless_recompute() {
        let sink = Arc::new(InMemoryEvaluationSink::new());
        sink.append(&EvaluationRecord::at(
            "A1",
            "S1",
            "toxicity_score",
            MetricValue::Numeric(1.0),
            Utc::now(),
        ))
        .await
        .unwrap();

        let source = InMemoryConversationSource::new(vec![
            Conversation::new("P1", "A1", "S1"),
            Conversation::new("P1", "A1", "S2"),
        ])
        .with_sink(sink);

        assert_eq!(sessions(&source, &build_selection_query(7, false)).await, vec!["S2"]);
        assert_eq!(sessions(&source, &build_selection_query(7, true)).await, vec!["S1", "S2"]);
    }

    #[tokio::test]
    async fn test_agent_filter() {
        let source = InMemoryConversationSource::new(vec![
            Conversation::new("P1", "A1", "S1"),
            Conversation::new("P1", "A2", "S2"),
        ]);
        let query = SelectionQueryBuilder::default().with_agent("A2").build(7, true);
        assert_eq!(sessions(&source, &query).await, vec!["S2"]);
    }

    #[tokio::test]
    async fn test_current_value_is_latest() {
        let sink = InMemoryEvaluationSink::new();
        let now = Utc::now();
        sink.append(&EvaluationRecord::at("A1", "S1", "m", MetricValue::Numeric(2.0), now))
            .await
            .unwrap();
        sink.append(&EvaluationRecord::at(
            "A1",
            "S1",
            "m",
            MetricValue::Numeric(1.0),
            now - Duration::minutes(5),
        ))
        .await
        .unwrap();

        let current = sink.current_value("S1", "m").await.unwrap();
        assert_eq!(current.metric_value_numeric, Some(2.0));
        assert_eq!(sink.records_for("S1", "m").await.len(), 2);
        assert!(sink.current_value("S1", "other").await.is_none());
    }
}
