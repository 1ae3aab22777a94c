use std::time::Duration;

use url::Url;

use crate::error::ChatApiError;
use crate::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";
pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";

/// Transport configuration for chat-completions requests.
#[derive(Debug, Clone)]
pub struct ChatApiConfig {
    /// Bearer token passed in `Authorization`.
    pub api_key: String,
    /// Full chat-completions endpoint URL.
    pub base_url: String,
    /// Model used when a request does not override it.
    pub model: String,
    /// Optional per-request timeout.
    pub timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for ChatApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl ChatApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub(crate) fn validate(&self) -> Result<Url, ChatApiError> {
        if self.api_key.trim().is_empty() {
            return Err(ChatApiError::MissingApiKey);
        }
        let url = Url::parse(self.base_url.trim())
            .map_err(|error| ChatApiError::InvalidBaseUrl(format!("{}: {error}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ChatApiError::InvalidBaseUrl(format!(
                "{}: scheme must be http or https",
                self.base_url
            )));
        }
        if self.timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(ChatApiError::InvalidTimeout);
        }
        Ok(url)
    }
}
