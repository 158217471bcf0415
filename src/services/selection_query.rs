//! Selection query builder.
//!
//! Produces the SQL that selects candidate conversations for a job. Pure:
//! it never touches the data store, so everything about a query can be
//! checked by inspecting its text.

use crate::domain::models::{EvaluationConfig, SelectionCriteria, SelectionQuery};

/// Builds the conversation selection query for one job.
#[derive(Debug, Clone)]
pub struct SelectionQueryBuilder {
    conversation_table: String,
    evaluation_table: String,
    agent_id: Option<String>,
}

impl Default for SelectionQueryBuilder {
    fn default() -> Self {
        Self::from_config(&EvaluationConfig::default())
    }
}

impl SelectionQueryBuilder {
    /// Builder over explicit table names.
    pub fn new(conversation_table: impl Into<String>, evaluation_table: impl Into<String>) -> Self {
        Self {
            conversation_table: conversation_table.into(),
            evaluation_table: evaluation_table.into(),
            agent_id: None,
        }
    }

    /// Builder over the configured tables.
    pub fn from_config(config: &EvaluationConfig) -> Self {
        Self::new(&config.conversation_table, &config.evaluation_table)
    }

    /// Restrict the selection to a single agent.
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Build the query for a time window in days.
    ///
    /// With `recompute = false` every session that already has at least one
    /// evaluation record is excluded, whatever metric it was for.
    pub fn build(&self, time_window_days: u32, recompute: bool) -> SelectionQuery {
        let mut sql = format!(
            "SELECT project_id, agent_id, session_id, conversation_turns FROM {} \
             WHERE julianday(conversation_timestamp) >= julianday('now', '-{} days')",
            quote_identifier(&self.conversation_table),
            time_window_days
        );

        if let Some(agent_id) = &self.agent_id {
            sql.push_str(&format!(" AND agent_id = {}", quote_literal(agent_id)));
        }

        if !recompute {
            sql.push_str(&format!(
                " AND session_id NOT IN (SELECT DISTINCT session_id FROM {} WHERE session_id IS NOT NULL)",
                quote_identifier(&self.evaluation_table)
            ));
        }

        sql.push_str(" ORDER BY session_id ASC, project_id ASC, agent_id ASC");

        let criteria = SelectionCriteria {
            time_window_days,
            recompute,
            agent_id: self.agent_id.clone(),
            conversation_table: self.conversation_table.clone(),
            evaluation_table: self.evaluation_table.clone(),
        };
        SelectionQuery::new(criteria, sql)
    }
}

/// Build a selection query against the default tables.
pub fn build_selection_query(time_window_days: u32, recompute: bool) -> SelectionQuery {
    SelectionQueryBuilder::default().build(time_window_days, recompute)
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
