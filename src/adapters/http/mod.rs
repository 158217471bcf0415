//! HTTP API adapters.

pub mod evaluation_http;

pub use evaluation_http::{build_router, EvaluationHttpConfig, EvaluationHttpServer};
