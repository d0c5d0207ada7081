//! `completionModel` capability interface (spec §6.5).

use async_trait::async_trait;
use feedengine_common::errors::{AppError, Result};
use std::time::Duration;

#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn call(&self, prompt: &str, temperature: f32) -> Result<String>;
}

/// Minimal OpenAI-chat-compatible HTTP client. Provider-specific request
/// shaping lives entirely in this one adapter; everything above it talks
/// only to the `CompletionModel` trait.
pub struct HttpCompletionModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl HttpCompletionModel {
    pub fn new(api_key: String, model: String, base_url: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            api_key,
            model,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        }
    }
}

#[derive(serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(serde::Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(serde::Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[async_trait]
impl CompletionModel for HttpCompletionModel {
    async fn call(&self, prompt: &str, temperature: f32) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            temperature,
            messages: vec![ChatMessage { role: "user", content: prompt }],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Transient { message: format!("completion request failed: {e}") })?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::Capacity { message: "completion model rate limited".into() });
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Transient { message: format!("completion API error {status}: {body}") });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Transient { message: format!("bad completion response: {e}") })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::Transient { message: "completion response had no choices".into() })
    }
}

/// Deterministic completion model for tests and for the interface
/// conformance fixtures used by `feedengine-providers`.
pub struct MockCompletionModel;

#[async_trait]
impl CompletionModel for MockCompletionModel {
    async fn call(&self, prompt: &str, _temperature: f32) -> Result<String> {
        Ok(format!("mock response for: {}", &prompt[..prompt.len().min(40)]))
    }
}
