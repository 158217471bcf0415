//! Scoring clients.

pub mod anthropic;
pub mod mock;

pub use anthropic::{AnthropicScoringClient, AnthropicScoringConfig};
pub use mock::{MockResponse, MockScoringClient};

use std::sync::Arc;

use crate::domain::errors::EvaluationResult;
use crate::domain::models::{ScoringConfig, ScoringProvider};
use crate::domain::ports::ScoringClient;

/// Build the scoring client selected by configuration.
pub fn create_scoring_client(config: &ScoringConfig) -> EvaluationResult<Arc<dyn ScoringClient>> {
    match config.provider {
        ScoringProvider::Mock => Ok(Arc::new(MockScoringClient::new(config.mock_response.clone()))),
        ScoringProvider::Anthropic => Ok(Arc::new(AnthropicScoringClient::from_config(config)?)),
    }
}
