//! Generation backends.
//!
//! Every backend implements [`LlmClient`]. [`create_client`] picks one from
//! [`ProviderSettings`] and wraps it in a [`RetryingClient`] so transient
//! failures are retried with backoff before they reach the agents.

pub mod anthropic;
pub mod client;
pub mod error;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod retry;

pub use anthropic::AnthropicClient;
pub use client::{ChatMessage, LlmClient, Role};
pub use error::BackendError;
pub use mock::{MockLlmClient, MockResponse};
pub use ollama::OllamaClient;
pub use openai::OpenAiCompatClient;
pub use retry::{RetryPolicy, RetryingClient};

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ProviderSettings;

/// Generation calls can be slow; local models especially.
const REQUEST_TIMEOUT_SECS: u64 = 300;

pub(crate) fn http_client() -> Result<Client, BackendError> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| BackendError::Configuration {
            message: format!("Failed to build HTTP client: {}", e),
        })
}

/// Send a request and decode a JSON body, classifying non-success statuses.
pub(crate) async fn post_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, BackendError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        return Err(BackendError::from_status(status.as_u16(), &body, retry_after));
    }
    response.json::<T>().await.map_err(|e| BackendError::InvalidResponse {
        message: e.to_string(),
    })
}

/// Build the configured backend, wrapped with retry.
///
/// `lookup` resolves environment variables (normally `std::env::var`).
pub fn create_client(
    settings: &ProviderSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn LlmClient>, BackendError> {
    let name = settings.name.to_lowercase();
    let model = settings.effective_model();
    let base_url = settings.base_url.clone().filter(|u| !u.trim().is_empty());

    let require_key = || {
        settings.api_key(&lookup).ok_or_else(|| BackendError::Configuration {
            message: format!(
                "No API key for provider '{}': set {}",
                name,
                settings.api_key_var().unwrap_or_default()
            ),
        })
    };

    let inner: Arc<dyn LlmClient> = match name.as_str() {
        "anthropic" => Arc::new(AnthropicClient::new(
            require_key()?,
            model,
            base_url,
            settings.max_tokens,
        )?),
        "ollama" => Arc::new(OllamaClient::new(base_url, model)?),
        other => {
            let url = base_url
                .or_else(|| openai::default_base_url(other).map(str::to_string))
                .ok_or_else(|| BackendError::Configuration {
                    message: format!("Provider '{}' needs provider.base_url", other),
                })?;
            Arc::new(OpenAiCompatClient::new(
                other.to_string(),
                url,
                Some(require_key()?),
                model,
                settings.max_tokens,
            )?)
        }
    };

    tracing::debug!(provider = inner.name(), model = inner.model(), "created backend");
    Ok(Arc::new(RetryingClient::new(
        inner,
        RetryPolicy::new(settings.max_retries),
    )))
}
