//! Bounded exponential backoff for transient backend failures.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::client::{ChatMessage, LlmClient};
use super::error::BackendError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Delay before retrying after the zero-based `attempt` failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Wraps any client, retrying transient failures and passing everything else through.
pub struct RetryingClient {
    inner: Arc<dyn LlmClient>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn LlmClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl LlmClient for RetryingClient {
    async fn chat(&self, system: &str, messages: &[ChatMessage]) -> Result<String, BackendError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match self.inner.chat(system, messages).await {
                Ok(reply) => return Ok(reply),
                Err(err) if err.is_transient() && attempt + 1 < attempts => {
                    let delay = match &err {
                        BackendError::RateLimit {
                            retry_after: Some(secs),
                        } => self.policy.delay_for(attempt).max(Duration::from_secs(*secs)),
                        _ => self.policy.delay_for(attempt),
                    };
                    tracing::warn!(
                        backend = self.inner.name(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient backend failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{MockLlmClient, MockResponse};

    fn instant(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let mock = Arc::new(MockLlmClient::new());
        mock.add_responses([
            MockResponse::error(BackendError::RateLimit { retry_after: None }),
            MockResponse::error(BackendError::Overloaded { status: 529 }),
            MockResponse::text("finally"),
        ]);
        let client = RetryingClient::new(mock.clone(), instant(3));
        let reply = client.chat("", &[ChatMessage::user("go")]).await.unwrap();
        assert_eq!(reply, "finally");
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let mock = Arc::new(MockLlmClient::new());
        mock.add_responses([
            MockResponse::error(BackendError::Timeout),
            MockResponse::error(BackendError::Timeout),
            MockResponse::text("too late"),
        ]);
        let client = RetryingClient::new(mock.clone(), instant(2));
        let err = client.chat("", &[]).await.unwrap_err();
        assert!(matches!(err, BackendError::Timeout));
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_propagate_immediately() {
        let mock = Arc::new(MockLlmClient::new());
        mock.add_responses([
            MockResponse::error(BackendError::Authentication {
                message: "bad key".into(),
            }),
            MockResponse::text("unreachable"),
        ]);
        let client = RetryingClient::new(mock.clone(), instant(3));
        let err = client.chat("", &[]).await.unwrap_err();
        assert!(matches!(err, BackendError::Authentication { .. }));
        assert_eq!(mock.calls(), 1);
    }
}
