//! Local Ollama backend (`/api/chat`, non-streaming).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::client::{ChatMessage, LlmClient};
use super::error::BackendError;
use super::{http_client, post_json};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, model: String) -> Result<Self, BackendError> {
        Ok(Self {
            http: http_client()?,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn chat(&self, system: &str, messages: &[ChatMessage]) -> Result<String, BackendError> {
        let mut turns = Vec::with_capacity(messages.len() + 1);
        if !system.is_empty() {
            turns.push(json!({ "role": "system", "content": system }));
        }
        turns.extend(messages.iter().map(|m| json!(m)));

        let request = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&json!({
                "model": self.model,
                "messages": turns,
                "stream": false,
            }));

        let response: ChatResponse = post_json(request).await?;
        response
            .message
            .map(|m| m.content)
            .ok_or_else(|| BackendError::InvalidResponse {
                message: "response carried no message".to_string(),
            })
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
