//! Transport for OpenAI-compatible chat-completions endpoints.
//!
//! This crate owns request building, response parsing and the retry policy
//! around one non-streamed round trip. It implements
//! [`agent_provider::ModelProvider`] so the orchestration engine never sees
//! HTTP types.
//!
//! All blocking points (the request, reading the body, the backoff sleep)
//! observe the caller's [`agent_provider::CancelSignal`].

pub mod client;
pub mod config;
pub mod error;
pub mod payload;
pub mod retry;

pub use client::{ChatApiClient, RetryNotice};
pub use config::{ChatApiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::ChatApiError;
pub use payload::{ChatCompletionRequest, ChatCompletionResponse};
pub use retry::RetryPolicy;
