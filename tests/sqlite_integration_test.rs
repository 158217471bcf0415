//! SQLite source and sink against the embedded schema.

mod common;

use chrono::{Duration, Utc};
use common::*;
use conveval::domain::errors::EvaluationError;
use conveval::domain::models::{EvaluationRecord, MetricValue};
use conveval::domain::ports::{ConversationSource, EvaluationSink};
use conveval::services::{build_selection_query, SelectionQueryBuilder};
use futures::TryStreamExt;

async fn selected_sessions(
    source: &dyn ConversationSource,
    query: &conveval::domain::models::SelectionQuery,
) -> (u64, Vec<String>) {
    let batch = source.resolve(query).await.unwrap();
    let conversations: Vec<_> = batch.conversations.try_collect().await.unwrap();
    (
        batch.total,
        conversations.into_iter().map(|c| c.session_id).collect(),
    )
}

#[tokio::test]
async fn test_paging_preserves_order_across_page_boundaries() {
    let conversations: Vec<_> = (0..7)
        .rev()
        .map(|i| conversation("A1", &format!("S{i:02}")))
        .collect();
    let (_pool, source, _sink) = sqlite_backend(&conversations, 3).await;

    let (total, sessions) = selected_sessions(source.as_ref(), &build_selection_query(7, true)).await;
    assert_eq!(total, 7);
    assert_eq!(
        sessions,
        vec!["S00", "S01", "S02", "S03", "S04", "S05", "S06"]
    );
}

#[tokio::test]
async fn test_time_window_uses_extraction_timestamp() {
    let (_pool, source, _sink) = sqlite_backend(&[conversation("A1", "fresh")], 10).await;
    source
        .ingest(&conversation("A1", "stale"), Utc::now() - Duration::days(9))
        .await
        .unwrap();

    let (_, week) = selected_sessions(source.as_ref(), &build_selection_query(7, true)).await;
    assert_eq!(week, vec!["fresh"]);

    let (_, month) = selected_sessions(source.as_ref(), &build_selection_query(30, true)).await;
    assert_eq!(month, vec!["fresh", "stale"]);
}

#[tokio::test]
async fn test_exclusion_is_per_session() {
    let (_pool, source, sink) = sqlite_backend(
        &[conversation("A1", "S1"), conversation("A1", "S2")],
        10,
    )
    .await;
    sink.append(&EvaluationRecord::at(
        "A1",
        "S1",
        "some_other_metric",
        MetricValue::Text("PASS".to_string()),
        Utc::now(),
    ))
    .await
    .unwrap();

    let (total, sessions) = selected_sessions(source.as_ref(), &build_selection_query(7, false)).await;
    assert_eq!(total, 1);
    assert_eq!(sessions, vec!["S2"]);

    let (total, _) = selected_sessions(source.as_ref(), &build_selection_query(7, true)).await;
    assert_eq!(total, 2);
}

#[tokio::test]
async fn test_agent_filter_is_escaped() {
    let (_pool, source, _sink) = sqlite_backend(
        &[conversation("A1", "S1"), conversation("o'brien", "S2")],
        10,
    )
    .await;

    let query = SelectionQueryBuilder::default()
        .with_agent("o'brien")
        .build(7, true);
    let (total, sessions) = selected_sessions(source.as_ref(), &query).await;
    assert_eq!(total, 1);
    assert_eq!(sessions, vec!["S2"]);
}

#[tokio::test]
async fn test_malformed_turns_surface_as_selection_failure() {
    let pool = sqlite_pool().await;
    sqlx::query(
        "INSERT INTO conversations (project_id, agent_id, session_id, conversation_turns, conversation_timestamp)
         VALUES ('P1', 'A1', 'S1', 'not json', strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
    )
    .execute(&pool)
    .await
    .unwrap();

    let source = conveval::adapters::sqlite::SqliteConversationSource::new(pool);
    let batch = source.resolve(&build_selection_query(7, true)).await.unwrap();
    assert_eq!(batch.total, 1);

    let result: Result<Vec<_>, _> = batch.conversations.try_collect().await;
    assert!(matches!(result, Err(EvaluationError::SelectionFailure(_))));
}

#[tokio::test]
async fn test_sink_round_trips_both_value_columns() {
    let (_pool, _source, sink) = sqlite_backend(&[], 10).await;
    let now = Utc::now();
    sink.append(&EvaluationRecord::at("A1", "S1", "toxicity_score", MetricValue::Numeric(0.2), now))
        .await
        .unwrap();
    sink.append(&EvaluationRecord::at(
        "A1",
        "S1",
        "hallucination_detection",
        MetricValue::Text("false".to_string()),
        now,
    ))
    .await
    .unwrap();

    let numeric = sink.current_value("S1", "toxicity_score").await.unwrap().unwrap();
    assert_eq!(numeric.metric_value_numeric, Some(0.2));
    assert!(numeric.metric_value_string.is_none());
    assert_eq!(numeric.timestamp.timestamp_micros(), now.timestamp_micros());

    let boolean = sink
        .current_value("S1", "hallucination_detection")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(boolean.metric_value_string.as_deref(), Some("false"));
    assert!(boolean.metric_value_numeric.is_none());
}

#[tokio::test]
async fn test_current_value_orders_by_timestamp_not_insertion() {
    let (_pool, _source, sink) = sqlite_backend(&[], 10).await;
    let now = Utc::now();
    sink.append(&EvaluationRecord::at("A1", "S1", "m", MetricValue::Numeric(2.0), now))
        .await
        .unwrap();
    sink.append(&EvaluationRecord::at(
        "A1",
        "S1",
        "m",
        MetricValue::Numeric(1.0),
        now - Duration::hours(1),
    ))
    .await
    .unwrap();

    let current = sink.current_value("S1", "m").await.unwrap().unwrap();
    assert_eq!(current.metric_value_numeric, Some(2.0));

    let history = sink.records_for("S1", "m").await.unwrap();
    assert_eq!(
        history.iter().map(|r| r.metric_value_numeric).collect::<Vec<_>>(),
        vec![Some(1.0), Some(2.0)]
    );
}
