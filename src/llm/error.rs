//! Generation backend errors.

use thiserror::Error;

/// Failure talking to a generation backend.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Rate limit exceeded{}", retry_hint(.retry_after))]
    RateLimit { retry_after: Option<u64> },

    #[error("Request timed out")]
    Timeout,

    #[error("Backend overloaded (HTTP {status})")]
    Overloaded { status: u16 },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Invalid response from backend: {message}")]
    InvalidResponse { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

fn retry_hint(retry_after: &Option<u64>) -> String {
    retry_after
        .map(|secs| format!(", retry after {} seconds", secs))
        .unwrap_or_default()
}

impl BackendError {
    /// Whether a retry with backoff may succeed (rate limiting, timeouts, overload).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::RateLimit { .. } | BackendError::Timeout | BackendError::Overloaded { .. }
        )
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: &str, retry_after: Option<u64>) -> Self {
        let message = body.chars().take(500).collect::<String>();
        match status {
            429 => BackendError::RateLimit { retry_after },
            408 | 504 => BackendError::Timeout,
            503 | 529 => BackendError::Overloaded { status },
            401 | 403 => BackendError::Authentication { message },
            _ => BackendError::Api { status, message },
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_decode() {
            BackendError::InvalidResponse {
                message: err.to_string(),
            }
        } else {
            BackendError::Network {
                message: err.to_string(),
            }
        }
    }
}
