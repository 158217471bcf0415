//! Domain layer for the conversation evaluation orchestrator
//!
//! This module contains the job model, metric definitions, transcripts,
//! evaluation records and the ports to external collaborators.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{EvaluationError, EvaluationResult};
