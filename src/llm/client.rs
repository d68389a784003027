use super::error::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation turn sent to a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send `messages` under the `system` prompt and return the reply text.
    async fn chat(&self, system: &str, messages: &[ChatMessage]) -> Result<String, BackendError>;

    fn name(&self) -> &str;

    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoClient;

    #[async_trait]
    impl LlmClient for EchoClient {
        async fn chat(
            &self,
            system: &str,
            messages: &[ChatMessage],
        ) -> Result<String, BackendError> {
            Ok(format!("{}|{}", system, messages.len()))
        }

        fn name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo-1"
        }
    }

    #[tokio::test]
    async fn test_client_trait_object() {
        let client: Box<dyn LlmClient> = Box::new(EchoClient);
        let reply = client
            .chat("sys", &[ChatMessage::user("hi"), ChatMessage::assistant("yo")])
            .await
            .unwrap();
        assert_eq!(reply, "sys|2");
        assert_eq!(client.name(), "echo");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::user("x")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"x"}"#);
    }
}
