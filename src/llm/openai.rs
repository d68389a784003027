//! OpenAI-compatible chat completions backend (OpenAI, Together, Groq and others).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::client::{ChatMessage, LlmClient};
use super::error::BackendError;
use super::{http_client, post_json};

/// Base URL used when none is configured for a known provider.
pub fn default_base_url(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("https://api.openai.com/v1"),
        "together" => Some("https://api.together.xyz/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        _ => None,
    }
}

pub struct OpenAiCompatClient {
    http: Client,
    provider: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatClient {
    pub fn new(
        provider: String,
        base_url: String,
        api_key: Option<String>,
        model: String,
        max_tokens: u32,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            http: http_client()?,
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            max_tokens,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn chat(&self, system: &str, messages: &[ChatMessage]) -> Result<String, BackendError> {
        let mut turns = Vec::with_capacity(messages.len() + 1);
        if !system.is_empty() {
            turns.push(json!({ "role": "system", "content": system }));
        }
        turns.extend(messages.iter().map(|m| json!(m)));

        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(&json!({
                "model": self.model,
                "messages": turns,
                "max_tokens": self.max_tokens,
            }));
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response: CompletionResponse = post_json(request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| BackendError::InvalidResponse {
                message: "response carried no choices".to_string(),
            })
    }

    fn name(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }
}
