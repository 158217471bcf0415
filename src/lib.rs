//! Conveval - Conversation Evaluation Job Orchestrator
//!
//! Conveval runs asynchronous evaluation jobs over conversational-agent
//! transcripts. A job selects recent conversations, asks an LLM judge to
//! score each applicable metric from a JSON catalog, and appends one typed
//! record per metric to an append-only evaluation table.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Jobs, metrics, transcripts, records and ports
//! - **Service Layer** (`services`): Job store, selection, catalog and the runner
//! - **Adapters** (`adapters`): SQLite, HTTP API, scoring clients, in-memory doubles
//! - **Infrastructure Layer** (`infrastructure`): Configuration, logging, setup
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use conveval::services::{EvaluationService, build_selection_query};
//! use conveval::domain::models::JobParameters;
//!
//! let job = service.submit(JobParameters::new(7)).await?;
//! let finished = service.wait(job.id).await?;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{EvaluationError, EvaluationResult};
pub use domain::models::{
    Config, Conversation, EvaluationJob, EvaluationRecord, JobParameters, JobStatus,
    MetricDefinition, MetricValue, ScoreValue, Turn, ValueType,
};
pub use domain::ports::{ConversationSource, EvaluationSink, ScoringClient};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{EvaluationRunner, EvaluationService, JobStore, MetricCatalog};
