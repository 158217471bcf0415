//! Selection query produced by the selection query builder.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The structured inputs a selection query was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionCriteria {
    /// Window in days
    pub time_window_days: u32,
    /// Whether evaluated sessions are re-selected
    pub recompute: bool,
    /// Optional single-agent filter
    pub agent_id: Option<String>,
    /// Table conversations are read from
    pub conversation_table: String,
    /// Table the exclusion clause reads
    pub evaluation_table: String,
}

/// Query text selecting candidate conversations, ordered by `session_id`.
///
/// The text never ends in a semicolon so callers can wrap it as a subquery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionQuery {
    criteria: SelectionCriteria,
    sql: String,
}

impl SelectionQuery {
    /// Pair query text with the criteria it encodes.
    pub fn new(criteria: SelectionCriteria, sql: String) -> Self {
        Self { criteria, sql }
    }

    /// Criteria the query was built from.
    pub fn criteria(&self) -> &SelectionCriteria {
        &self.criteria
    }

    /// SQL text.
    pub fn as_sql(&self) -> &str {
        &self.sql
    }
}

impl fmt::Display for SelectionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}
