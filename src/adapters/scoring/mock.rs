//! Mock scoring client for tests and offline runs.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::domain::errors::{EvaluationError, EvaluationResult};
use crate::domain::models::{ScoreValue, Turn};
use crate::domain::ports::ScoringClient;

/// Canned scoring outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    /// Raw model output, interpreted with [`ScoreValue::infer`]
    Output(String),
    /// Simulated transport failure
    Failure(String),
}

impl MockResponse {
    pub fn output(output: impl Into<String>) -> Self {
        Self::Output(output.into())
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure(reason.into())
    }
}

/// Scoring client returning canned responses.
///
/// Overrides are matched against the prompt by substring, first match wins.
pub struct MockScoringClient {
    default_response: MockResponse,
    overrides: RwLock<Vec<(String, MockResponse)>>,
    calls: AtomicUsize,
}

impl MockScoringClient {
    pub fn new(default_output: impl Into<String>) -> Self {
        Self::with_default_response(MockResponse::output(default_output))
    }

    pub fn with_default_response(response: MockResponse) -> Self {
        Self {
            default_response: response,
            overrides: RwLock::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Client that fails every call.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self::with_default_response(MockResponse::failure(reason))
    }

    pub fn with_override(self, prompt_contains: impl Into<String>, output: impl Into<String>) -> Self {
        self.with_override_response(prompt_contains, MockResponse::output(output))
    }

    pub fn with_override_response(
        mut self,
        prompt_contains: impl Into<String>,
        response: MockResponse,
    ) -> Self {
        self.overrides
            .get_mut()
            .push((prompt_contains.into(), response));
        self
    }

    /// Set a response for prompts containing `prompt_contains`.
    pub async fn set_response(&self, prompt_contains: impl Into<String>, response: MockResponse) {
        let mut overrides = self.overrides.write().await;
        overrides.push((prompt_contains.into(), response));
    }

    /// Number of score calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn response_for(&self, prompt: &str) -> MockResponse {
        let overrides = self.overrides.read().await;
        overrides
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.default_response.clone())
    }
}

impl Default for MockScoringClient {
    fn default() -> Self {
        Self::new("5")
    }
}

#[async_trait]
impl ScoringClient for MockScoringClient {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn score(&self, prompt: &str, _transcript: &[Turn]) -> EvaluationResult<ScoreValue> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.response_for(prompt).await {
            MockResponse::Output(raw) => ScoreValue::infer(&raw)
                .ok_or_else(|| EvaluationError::ScoringFailure("empty model output".to_string())),
            MockResponse::Failure(reason) => Err(EvaluationError::ScoringFailure(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_and_override() {
        let client = MockScoringClient::new("3").with_override("COMPLIANT", "COMPLIANT");

        assert_eq!(
            client.score("Rate toxicity", &[]).await.unwrap(),
            ScoreValue::Numeric(3.0)
        );
        assert_eq!(
            client.score("Answer COMPLIANT or NOT", &[]).await.unwrap(),
            ScoreValue::Text("COMPLIANT".to_string())
        );
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_response() {
        let client = MockScoringClient::failing("upstream 503");
        let err = client.score("anything", &[]).await.unwrap_err();
        assert!(matches!(err, EvaluationError::ScoringFailure(reason) if reason == "upstream 503"));
    }

    #[tokio::test]
    async fn test_runtime_override() {
        let client = MockScoringClient::new("1");
        client.set_response("Escalate", MockResponse::output("true")).await;
        assert_eq!(
            client.score("Escalate?", &[]).await.unwrap(),
            ScoreValue::Boolean(true)
        );
    }

    #[tokio::test]
    async fn test_empty_output_is_failure() {
        let client = MockScoringClient::new("  ");
        assert!(client.score("p", &[]).await.is_err());
    }
}
