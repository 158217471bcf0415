//! Evaluation sink port.

use async_trait::async_trait;

use crate::domain::errors::EvaluationResult;
use crate::domain::models::EvaluationRecord;

/// Append-only store of evaluation records.
///
/// No update or delete exists: recomputation appends a record with a
/// later timestamp.
#[async_trait]
pub trait EvaluationSink: Send + Sync {
    /// Append one record. Failures are `SinkWriteFailure`s.
    async fn append(&self, record: &EvaluationRecord) -> EvaluationResult<()>;
}
