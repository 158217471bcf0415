//! Anthropic Messages API scoring client.
//!
//! Sends the metric prompt followed by the rendered transcript as a single
//! user message and interprets the text reply as the metric value.

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::domain::errors::{EvaluationError, EvaluationResult};
use crate::domain::models::{render_transcript, ScoreValue, ScoringConfig, Turn};
use crate::domain::ports::ScoringClient;

const API_VERSION: &str = "2023-06-01";

/// Configuration for the Anthropic scoring client.
#[derive(Debug, Clone)]
pub struct AnthropicScoringConfig {
    /// Read from `ANTHROPIC_API_KEY` when unset
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub api_version: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub requests_per_second: u32,
    pub burst_size: u32,
}

impl Default for AnthropicScoringConfig {
    fn default() -> Self {
        Self::from(&ScoringConfig::default())
    }
}

impl From<&ScoringConfig> for AnthropicScoringConfig {
    fn from(config: &ScoringConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_version: API_VERSION.to_string(),
            timeout_secs: config.timeout_secs,
            max_tokens: config.max_tokens,
            requests_per_second: config.requests_per_second,
            burst_size: config.burst_size,
        }
    }
}

impl AnthropicScoringConfig {
    /// Get API key from config or environment.
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Scoring client backed by the Anthropic Messages API.
///
/// Clones share the HTTP client and the rate limiter, so every job in the
/// process draws from one request budget.
#[derive(Clone)]
pub struct AnthropicScoringClient {
    config: AnthropicScoringConfig,
    api_key: String,
    client: Client,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl AnthropicScoringClient {
    pub fn new(config: AnthropicScoringConfig) -> EvaluationResult<Self> {
        let api_key = config.get_api_key().ok_or_else(|| {
            EvaluationError::InvalidParameters("ANTHROPIC_API_KEY not set".to_string())
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                EvaluationError::InvalidParameters(format!("Failed to create HTTP client: {e}"))
            })?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(per_second);
        let limiter = RateLimiter::direct(Quota::per_second(per_second).allow_burst(burst));

        Ok(Self {
            config,
            api_key,
            client,
            limiter: Arc::new(limiter),
        })
    }

    pub fn from_config(config: &ScoringConfig) -> EvaluationResult<Self> {
        Self::new(AnthropicScoringConfig::from(config))
    }

    fn build_prompt(prompt: &str, transcript: &[Turn]) -> String {
        format!("{prompt}\n\nConversation:\n{}", render_transcript(transcript))
    }
}

#[async_trait]
impl ScoringClient for AnthropicScoringClient {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn score(&self, prompt: &str, transcript: &[Turn]) -> EvaluationResult<ScoreValue> {
        self.limiter.until_ready().await;

        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![Message {
                role: "user",
                content: Self::build_prompt(prompt, transcript),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EvaluationError::ScoringFailure(format!(
                "API error {status}: {body}"
            )));
        }

        let result: MessagesResponse = response.json().await.map_err(|e| {
            EvaluationError::ScoringFailure(format!("Failed to parse response: {e}"))
        })?;

        let text = result
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        debug!(model = %self.config.model, output = %text, "scoring response received");

        ScoreValue::infer(&text)
            .ok_or_else(|| EvaluationError::ScoringFailure("empty model output".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::Server) -> AnthropicScoringClient {
        let config = AnthropicScoringConfig::default()
            .with_api_key("test-key")
            .with_base_url(server.url());
        AnthropicScoringClient::new(config).unwrap()
    }

    #[test]
    fn test_build_prompt_appends_transcript() {
        let turns = vec![Turn::user("Hi"), Turn::bot("Hello!")];
        assert_eq!(
            AnthropicScoringClient::build_prompt("Rate toxicity 0-10.", &turns),
            "Rate toxicity 0-10.\n\nConversation:\nUser: Hi\nBot: Hello!"
        );
    }

    #[test]
    fn test_missing_api_key_rejected() {
        temp_env::with_var_unset("ANTHROPIC_API_KEY", || {
            let result = AnthropicScoringClient::new(AnthropicScoringConfig::default());
            assert!(matches!(result, Err(EvaluationError::InvalidParameters(_))));
        });
    }

    #[tokio::test]
    async fn test_numeric_reply() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .match_header("anthropic-version", API_VERSION)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "messages": [{"role": "user", "content": "Rate toxicity\n\nConversation:\nUser: hi"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"content": [{"type": "text", "text": "0.2"}]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let score = client.score("Rate toxicity", &[Turn::user("hi")]).await.unwrap();
        assert_eq!(score, ScoreValue::Numeric(0.2));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_scoring_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body("overloaded")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.score("p", &[]).await.unwrap_err();
        assert!(matches!(&err, EvaluationError::ScoringFailure(msg) if msg.contains("529")));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_empty_reply_is_scoring_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(r#"{"content": []}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        assert!(matches!(
            client.score("p", &[]).await,
            Err(EvaluationError::ScoringFailure(_))
        ));
    }
}
