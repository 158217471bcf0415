//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces for the collaborators the runner depends on:
//! - ConversationSource: executes selection queries, streams conversations
//! - EvaluationSink: appends evaluation records
//! - ScoringClient: LLM-judged scoring of one metric on one transcript

pub mod conversation_source;
pub mod evaluation_sink;
pub mod scoring_client;

pub use conversation_source::{ConversationBatch, ConversationSource, ConversationStream};
pub use evaluation_sink::EvaluationSink;
pub use scoring_client::ScoringClient;
