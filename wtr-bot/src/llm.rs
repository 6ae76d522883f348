//! OpenAI-compatible chat completion client

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use wtr_common::config::LlmConfig;

use crate::error::{BotError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Anything that can answer a chat prompt
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

pub struct LlmClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ChatCompletion for LlmClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!(model = %self.model, messages = messages.len(), "Requesting completion");

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                model: &self.model,
                messages,
                temperature: 0.2,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BotError::Api(status.as_u16(), error_text));
        }

        let completion: CompletionResponse = response.json().await?;
        first_answer(completion)
    }
}

fn first_answer(completion: CompletionResponse) -> Result<String> {
    completion
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.trim().to_string())
        .filter(|answer| !answer.is_empty())
        .ok_or(BotError::EmptyCompletion)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_answer() {
        let raw = r#"{"id": "x", "choices": [{"index": 0, "message": {"role": "assistant", "content": "  Revenue is up.\n"}}]}"#;
        let completion: CompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(first_answer(completion).unwrap(), "Revenue is up.");
    }

    #[test]
    fn test_empty_choices() {
        let completion: CompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(first_answer(completion), Err(BotError::EmptyCompletion)));
    }

    #[test]
    fn test_request_shape() {
        let messages = [ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let body = serde_json::to_value(CompletionRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            temperature: 0.2,
        })
        .unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
    }
}
