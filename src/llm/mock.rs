use super::client::{ChatMessage, LlmClient};
use super::error::BackendError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Scripted backend for tests: replies are served in order.
pub struct MockLlmClient {
    responses: Mutex<VecDeque<MockResponse>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    name: String,
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub content: String,
    pub error: Option<BackendError>,
}

impl MockResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            error: None,
        }
    }

    pub fn error(error: BackendError) -> Self {
        Self {
            content: String::new(),
            error: Some(error),
        }
    }
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::with_name("mock")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            name: name.into(),
        }
    }

    pub fn add_response(&self, response: MockResponse) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
    }

    pub fn add_responses(&self, responses: impl IntoIterator<Item = MockResponse>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.extend(responses);
        }
    }

    pub fn remaining_responses(&self) -> usize {
        self.responses.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Last user message of every call received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat(&self, _system: &str, messages: &[ChatMessage]) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let (Ok(mut prompts), Some(last)) = (self.prompts.lock(), messages.last()) {
            prompts.push(last.content.clone());
        }

        let response = self
            .responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .ok_or_else(|| BackendError::InvalidResponse {
                message: "MockLlmClient: no more responses in queue".to_string(),
            })?;

        match response.error {
            Some(error) => Err(error),
            None => Ok(response.content),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
