//! Domain models for the evaluation orchestrator.

pub mod config;
pub mod conversation;
pub mod evaluation;
pub mod job;
pub mod metric;
pub mod selection;

pub use config::{
    Config, DatabaseConfig, EvaluationConfig, LoggingConfig, RetryConfig, ScoringConfig,
    ScoringProvider, ServerConfig,
};
pub use conversation::{render_transcript, Conversation, Role, Turn};
pub use evaluation::{EvaluationRecord, MetricValue, ScoreValue};
pub use job::{EvaluationJob, JobParameters, JobStatus, ProgressDelta};
pub use metric::{AgentScope, MetricDefinition, ValueType, ALL_AGENTS};
pub use selection::{SelectionCriteria, SelectionQuery};
