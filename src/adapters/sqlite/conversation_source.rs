//! SQLite implementation of the ConversationSource.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use sqlx::SqlitePool;
use tracing::debug;

use super::quote_identifier;
use crate::domain::errors::{EvaluationError, EvaluationResult};
use crate::domain::models::{Conversation, SelectionQuery};
use crate::domain::ports::{ConversationBatch, ConversationSource};

const DEFAULT_PAGE_SIZE: u32 = 100;
/// Keys per page, each bound as three parameters.
const MAX_PAGE_SIZE: u32 = 1000;

/// Snapshots the selected `(session_id, project_id, agent_id)` keys at
/// resolve time and loads the conversation rows one page of keys at a time.
#[derive(Clone)]
pub struct SqliteConversationSource {
    pool: SqlitePool,
    table: String,
    page_size: u32,
}

impl SqliteConversationSource {
    /// Source over the default `conversations` table.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            table: "conversations".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Table written by [`Self::ingest`].
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Keys loaded per page, clamped to 1..=1000.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Insert or replace an extracted conversation.
    pub async fn ingest(
        &self,
        conversation: &Conversation,
        extracted_at: DateTime<Utc>,
    ) -> EvaluationResult<()> {
        let turns = serde_json::to_string(&conversation.turns)?;
        let sql = format!(
            "INSERT OR REPLACE INTO {} (project_id, agent_id, session_id, conversation_turns, conversation_timestamp)
             VALUES (?, ?, ?, ?, ?)",
            quote_identifier(&self.table)
        );

        sqlx::query(&sql)
            .bind(&conversation.project_id)
            .bind(&conversation.agent_id)
            .bind(&conversation.session_id)
            .bind(&turns)
            .bind(extracted_at.to_rfc3339_opts(SecondsFormat::Millis, true))
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ConversationRow {
    project_id: String,
    agent_id: String,
    session_id: String,
    conversation_turns: String,
}

impl TryFrom<ConversationRow> for Conversation {
    type Error = EvaluationError;

    fn try_from(row: ConversationRow) -> Result<Self, Self::Error> {
        let turns = Conversation::turns_from_json(&row.conversation_turns).map_err(|e| {
            EvaluationError::SelectionFailure(format!(
                "malformed turns for session {}: {e}",
                row.session_id
            ))
        })?;

        Ok(Self {
            project_id: row.project_id,
            agent_id: row.agent_id,
            session_id: row.session_id,
            turns,
        })
    }
}

/// Identity of a selected conversation.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ConversationKey {
    session_id: String,
    project_id: String,
    agent_id: String,
}

fn selection_error(err: sqlx::Error) -> EvaluationError {
    EvaluationError::SelectionFailure(err.to_string())
}

/// Keys of every conversation the query selects right now, in stream order.
async fn snapshot_keys(pool: &SqlitePool, sql: &str) -> EvaluationResult<Vec<ConversationKey>> {
    let keys_sql = format!(
        "SELECT DISTINCT session_id, project_id, agent_id FROM ({sql}) \
         ORDER BY session_id, project_id, agent_id"
    );
    sqlx::query_as::<_, ConversationKey>(&keys_sql)
        .fetch_all(pool)
        .await
        .map_err(selection_error)
}

/// Load the rows for one page of snapshotted keys.
async fn fetch_page(
    pool: &SqlitePool,
    table: &str,
    keys: &[ConversationKey],
) -> EvaluationResult<Vec<ConversationRow>> {
    let placeholders = vec!["(?, ?, ?)"; keys.len()].join(", ");
    let page_sql = format!(
        "SELECT project_id, agent_id, session_id, conversation_turns FROM {} \
         WHERE (session_id, project_id, agent_id) IN (VALUES {placeholders}) \
         ORDER BY session_id, project_id, agent_id",
        quote_identifier(table)
    );

    let mut query = sqlx::query_as::<_, ConversationRow>(&page_sql);
    for key in keys {
        query = query
            .bind(&key.session_id)
            .bind(&key.project_id)
            .bind(&key.agent_id);
    }
    query.fetch_all(pool).await.map_err(selection_error)
}

#[async_trait]
impl ConversationSource for SqliteConversationSource {
    /// The selected keys are captured once, so records the job appends
    /// while it runs cannot remove conversations from later pages.
    async fn resolve(&self, query: &SelectionQuery) -> EvaluationResult<ConversationBatch> {
        let keys = snapshot_keys(&self.pool, query.as_sql()).await?;
        let limit = keys.len();
        let total = u64::try_from(limit).unwrap_or(u64::MAX);
        debug!(total, page_size = self.page_size, "selection snapshotted");

        let pool = self.pool.clone();
        let table = query.criteria().conversation_table.clone();
        let pages: Vec<Vec<ConversationKey>> = keys
            .chunks(self.page_size as usize)
            .map(<[ConversationKey]>::to_vec)
            .collect();

        let conversations = stream::iter(pages)
            .then(move |page| {
                let pool = pool.clone();
                let table = table.clone();
                async move { fetch_page(&pool, &table, &page).await }
            })
            .map_ok(|rows| stream::iter(rows.into_iter().map(Conversation::try_from)))
            .try_flatten()
            .take(limit)
            .boxed();

        Ok(ConversationBatch {
            total,
            conversations,
        })
    }
}
