use serde::Deserialize;

/// Failure to construct a client.
#[derive(Debug, thiserror::Error)]
pub enum ChatApiError {
    #[error("API key is required")]
    MissingApiKey,
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("timeout must be greater than zero")]
    InvalidTimeout,
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("failed to initialize tokio runtime: {0}")]
    Runtime(std::io::Error),
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorFields>,
}

#[derive(Debug, Deserialize)]
struct ErrorFields {
    message: Option<String>,
}

/// Best-effort human-readable message from an error body: the JSON
/// `error.message` when present, otherwise the raw body.
#[must_use]
pub fn parse_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|fields| fields.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| body.trim().to_string())
}
