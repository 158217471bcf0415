//! Scoring client port - interface for LLM judges.

use async_trait::async_trait;

use crate::domain::errors::EvaluationResult;
use crate::domain::models::{ScoreValue, Turn};

/// Evaluates one metric prompt against one transcript.
///
/// Timeouts are the client's responsibility; the runner sees one
/// success or `ScoringFailure` per call.
#[async_trait]
pub trait ScoringClient: Send + Sync {
    /// Get the client type name.
    fn name(&self) -> &'static str;

    /// Score a transcript. An empty transcript is still sent.
    async fn score(&self, prompt: &str, transcript: &[Turn]) -> EvaluationResult<ScoreValue>;
}
