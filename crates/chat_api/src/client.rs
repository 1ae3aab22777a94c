use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use agent_provider::{
    CancelSignal, CompletionRequest, CompletionResponse, ModelProvider, ProviderError,
    ProviderProfile,
};
use reqwest::Client;
use tokio::runtime::Runtime;
use url::Url;

use crate::config::ChatApiConfig;
use crate::error::{parse_error_message, ChatApiError};
use crate::payload::{ChatCompletionRequest, ChatCompletionResponse};
use crate::retry::is_retryable_status;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);
const PROVIDER_ID: &str = "chat-completions";

/// Announced before each backoff wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryNotice {
    /// 1-based retry number.
    pub retry: u32,
    pub max_retries: u32,
    pub delay: Duration,
    pub reason: String,
}

pub type RetryObserver = Arc<dyn Fn(&RetryNotice) + Send + Sync>;

/// Chat-completions client with its own single-threaded runtime, so callers
/// can use it from plain blocking code.
pub struct ChatApiClient {
    http: Client,
    endpoint: Url,
    config: ChatApiConfig,
    runtime: Runtime,
    on_retry: Option<RetryObserver>,
}

impl fmt::Debug for ChatApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatApiClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.config.model)
            .field("retry", &self.config.retry)
            .finish_non_exhaustive()
    }
}

impl ChatApiClient {
    pub fn new(config: ChatApiConfig) -> Result<Self, ChatApiError> {
        let endpoint = config.validate()?;
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ChatApiError::Runtime)?;

        Ok(Self {
            http,
            endpoint,
            config,
            runtime,
            on_retry: None,
        })
    }

    /// Registers a callback invoked before every backoff wait.
    #[must_use]
    pub fn with_retry_observer(mut self, observer: RetryObserver) -> Self {
        self.on_retry = Some(observer);
        self
    }

    pub fn config(&self) -> &ChatApiConfig {
        &self.config
    }

    pub fn build_payload(&self, request: CompletionRequest) -> ChatCompletionRequest {
        let model = request
            .model
            .unwrap_or_else(|| self.config.model.clone());
        ChatCompletionRequest::new(
            model,
            request.messages,
            &request.tools,
            request.include_reasoning,
        )
    }

    /// Sends `payload`, retrying transport failures, 429 and 5xx responses.
    /// Returns the body of the first successful response.
    pub async fn send_with_retry(
        &self,
        payload: &ChatCompletionRequest,
        cancel: &CancelSignal,
    ) -> Result<String, ProviderError> {
        let policy = self.config.retry;
        let mut last_error = String::new();

        for attempt in 0..policy.attempts() {
            if attempt > 0 {
                let notice = RetryNotice {
                    retry: attempt,
                    max_retries: policy.max_retries,
                    delay: policy.delay_for(attempt),
                    reason: last_error.clone(),
                };
                tracing::warn!(
                    retry = notice.retry,
                    delay_ms = notice.delay.as_millis() as u64,
                    reason = %notice.reason,
                    "retrying chat completion"
                );
                if let Some(observer) = &self.on_retry {
                    observer(&notice);
                }
                await_or_cancel(tokio::time::sleep(notice.delay), cancel).await?;
            }
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }

            let send = self
                .http
                .post(self.endpoint.clone())
                .bearer_auth(&self.config.api_key)
                .json(payload)
                .send();
            let response = match await_or_cancel(send, cancel).await? {
                Ok(response) => response,
                Err(error) => {
                    last_error = format!("error sending request: {error}");
                    continue;
                }
            };

            let status = response.status().as_u16();
            let body = match await_or_cancel(response.text(), cancel).await? {
                Ok(body) => body,
                Err(error) => {
                    last_error = format!("error reading response: {error}");
                    continue;
                }
            };

            if (200..300).contains(&status) {
                return Ok(body);
            }
            if status == 400 {
                return Err(ProviderError::BadRequest { body });
            }
            if is_retryable_status(status) {
                last_error = format!("HTTP {status}: {}", parse_error_message(&body));
                continue;
            }
            return Err(ProviderError::Status { status, body });
        }

        Err(ProviderError::RetryExhausted {
            attempts: policy.attempts(),
            last_error,
        })
    }

    pub async fn complete_async(
        &self,
        request: CompletionRequest,
        cancel: &CancelSignal,
    ) -> Result<CompletionResponse, ProviderError> {
        let payload = self.build_payload(request);
        let body = self.send_with_retry(&payload, cancel).await?;
        parse_completion(&body)
    }
}

/// Interprets a 2xx body: an embedded error object wins, then the first choice.
pub fn parse_completion(body: &str) -> Result<CompletionResponse, ProviderError> {
    let response: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|error| ProviderError::Decode(error.to_string()))?;
    if let Some(error) = response.error {
        return Err(ProviderError::Api {
            message: error.message,
        });
    }
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyChoices)?;
    Ok(CompletionResponse {
        message: choice.message,
        usage: response.usage,
    })
}

impl ModelProvider for ChatApiClient {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: PROVIDER_ID.to_string(),
            model_id: self.config.model.clone(),
        }
    }

    fn complete(
        &self,
        request: CompletionRequest,
        cancel: &CancelSignal,
    ) -> Result<CompletionResponse, ProviderError> {
        self.runtime.block_on(self.complete_async(request, cancel))
    }
}

async fn await_or_cancel<F>(future: F, cancel: &CancelSignal) -> Result<F::Output, ProviderError>
where
    F: Future,
{
    let mut future = Box::pin(future);

    loop {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }
            return Ok(output);
        }
    }
}
