//! Domain errors for the evaluation orchestrator.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::JobStatus;

/// Errors that can occur while managing or running evaluation jobs.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// Job-creation input was rejected before any job existed.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// A state machine operation was attempted from the wrong state.
    #[error("Invalid state transition for job {job_id} from {from} to {to}")]
    InvalidTransition {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    /// Progress would push `processed_conversations` past the known total.
    #[error("Progress overflow for job {job_id}: {processed} processed of {total}")]
    ProgressOverflow {
        job_id: Uuid,
        processed: u64,
        total: u64,
    },

    /// The conversation source could not be queried. Fatal to the job.
    #[error("Conversation selection failed: {0}")]
    SelectionFailure(String),

    /// One metric on one conversation could not be scored.
    #[error("Scoring failed: {0}")]
    ScoringFailure(String),

    /// An evaluation record could not be appended.
    #[error("Evaluation sink write failed: {0}")]
    SinkWriteFailure(String),

    #[error("Metric catalog error: {0}")]
    Catalog(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result alias for evaluation operations.
pub type EvaluationResult<T> = Result<T, EvaluationError>;

impl EvaluationError {
    /// Stable machine-readable code, used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParameters(_) => "INVALID_PARAMETERS",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::JobNotFound(_) => "NOT_FOUND",
            Self::ProgressOverflow { .. } => "PROGRESS_OVERFLOW",
            Self::SelectionFailure(_) => "SELECTION_FAILURE",
            Self::ScoringFailure(_) => "SCORING_FAILURE",
            Self::SinkWriteFailure(_) => "SINK_WRITE_FAILURE",
            Self::Catalog(_) => "CATALOG_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ScoringFailure(_) | Self::SinkWriteFailure(_) | Self::Database(_)
        )
    }
}

impl From<sqlx::Error> for EvaluationError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for EvaluationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for EvaluationError {
    fn from(err: reqwest::Error) -> Self {
        Self::ScoringFailure(err.to_string())
    }
}
