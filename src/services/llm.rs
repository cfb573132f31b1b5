//! Generation client for grounded assessment answers
//!
//! Wraps the Anthropic messages API behind the [`Generator`] trait: one
//! synchronous prompt-to-text call per invocation. Retry policy lives with
//! the caller (the assessment generator), not here.

use crate::config::LlmConfig;
use crate::error::{DossierError, Result};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// A provider-agnostic generation call: prompt in, text out
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Anthropic messages API client
pub struct LlmClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: usize,
    temperature: f32,
}

/// API message format
#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: usize,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

/// API response format
#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    text: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if config.api_key.expose_secret().is_empty() {
            return Err(DossierError::Configuration(
                "generation API key is empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.expose_secret().to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Generator for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_chars = prompt.len(), "Calling generation API");

        let request = ApiRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(DossierError::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(DossierError::Generation(format!(
                "API request failed with status {}: {}",
                status, error_text
            )));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| DossierError::Generation(format!("Failed to parse response: {}", e)))?;

        api_response
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| DossierError::Generation("Empty response from API".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn test_empty_api_key_rejected() {
        let config = LlmConfig {
            api_key: SecretString::new("".into()),
            model: "claude-3-5-haiku-20241022".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
        };
        assert!(matches!(
            LlmClient::new(&config),
            Err(DossierError::Configuration(_))
        ));
    }

    #[test]
    fn test_request_serialization_shape() {
        let request = ApiRequest {
            model: "claude-3-5-haiku-20241022".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            messages: vec![Message {
                role: "user".to_string(),
                content: "hello".to_string(),
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 4096);
    }
}
