//! SQLite implementation of the EvaluationSink.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;

use super::quote_identifier;
use crate::domain::errors::{EvaluationError, EvaluationResult};
use crate::domain::models::EvaluationRecord;
use crate::domain::ports::EvaluationSink;

/// Append-only evaluation table.
#[derive(Clone)]
pub struct SqliteEvaluationSink {
    pool: SqlitePool,
    table: String,
}

impl SqliteEvaluationSink {
    /// Sink over the default `evaluations` table.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            table: "evaluations".to_string(),
        }
    }

    /// Append to a different table.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Latest record for a session and metric.
    pub async fn current_value(
        &self,
        session_id: &str,
        metric: &str,
    ) -> EvaluationResult<Option<EvaluationRecord>> {
        let sql = format!(
            "SELECT * FROM {} WHERE session_id = ? AND metric = ? ORDER BY timestamp DESC LIMIT 1",
            quote_identifier(&self.table)
        );
        let row: Option<EvaluationRow> = sqlx::query_as(&sql)
            .bind(session_id)
            .bind(metric)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Every record for a session and metric, oldest first.
    pub async fn records_for(
        &self,
        session_id: &str,
        metric: &str,
    ) -> EvaluationResult<Vec<EvaluationRecord>> {
        let sql = format!(
            "SELECT * FROM {} WHERE session_id = ? AND metric = ? ORDER BY timestamp ASC",
            quote_identifier(&self.table)
        );
        let rows: Vec<EvaluationRow> = sqlx::query_as(&sql)
            .bind(session_id)
            .bind(metric)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Number of stored records.
    pub async fn count(&self) -> EvaluationResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(&self.table));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[async_trait]
impl EvaluationSink for SqliteEvaluationSink {
    async fn append(&self, record: &EvaluationRecord) -> EvaluationResult<()> {
        let sql = format!(
            "INSERT INTO {} (agent_id, session_id, timestamp, metric, metric_value_string, metric_value_numeric)
             VALUES (?, ?, ?, ?, ?, ?)",
            quote_identifier(&self.table)
        );

        sqlx::query(&sql)
            .bind(&record.agent_id)
            .bind(&record.session_id)
            .bind(record.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true))
            .bind(&record.metric)
            .bind(&record.metric_value_string)
            .bind(record.metric_value_numeric)
            .execute(&self.pool)
            .await
            .map_err(|e| EvaluationError::SinkWriteFailure(e.to_string()))?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct EvaluationRow {
    agent_id: String,
    session_id: String,
    timestamp: String,
    metric: String,
    metric_value_string: Option<String>,
    metric_value_numeric: Option<f64>,
}

impl TryFrom<EvaluationRow> for EvaluationRecord {
    type Error = EvaluationError;

    fn try_from(row: EvaluationRow) -> Result<Self, Self::Error> {
        let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)
            .map_err(|e| EvaluationError::Serialization(format!("invalid timestamp: {e}")))?
            .with_timezone(&Utc);

        Ok(Self {
            agent_id: row.agent_id,
            session_id: row.session_id,
            timestamp,
            metric: row.metric,
            metric_value_string: row.metric_value_string,
            metric_value_numeric: row.metric_value_numeric,
        })
    }
}
