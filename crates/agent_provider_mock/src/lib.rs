//! Deterministic scripted implementation of the `agent_provider` contract.
//!
//! Replays a queue of prepared outcomes in order and records every request it
//! receives. Intended for controller-level integration tests and offline runs.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use agent_provider::{
    CancelSignal, CompletionRequest, CompletionResponse, Message, ModelProvider, ProviderError,
    ProviderProfile, ToolCall, Usage,
};

/// Stable provider identifier reported by [`ScriptedProvider::profile`].
pub const MOCK_PROVIDER_ID: &str = "mock";

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One prepared provider outcome.
#[derive(Debug, Clone)]
pub enum Step {
    Respond(Result<CompletionResponse, ProviderError>),
    /// Blocks until the caller's signal is cancelled, then reports `Cancelled`.
    HangUntilCancelled,
}

/// Replays scripted completions. Once the script is exhausted every call
/// reports [`ProviderError::Api`].
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    model_id: String,
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    #[must_use]
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            model_id: "mock".to_string(),
            steps: Mutex::new(steps.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Appends a step to the end of the script.
    pub fn push(&self, step: Step) {
        lock_unpoisoned(&self.steps).push_back(step);
    }

    /// Every request received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        lock_unpoisoned(&self.steps).len()
    }
}

/// Assistant reply carrying only text.
#[must_use]
pub fn text(content: &str) -> Step {
    Step::Respond(Ok(CompletionResponse {
        message: Message::assistant(content),
        usage: None,
    }))
}

/// Assistant reply carrying text and a usage report.
#[must_use]
pub fn text_with_usage(content: &str, total_tokens: u64) -> Step {
    Step::Respond(Ok(CompletionResponse {
        message: Message::assistant(content),
        usage: Some(Usage {
            total_tokens,
            ..Usage::default()
        }),
    }))
}

/// Assistant reply requesting the given tool calls.
#[must_use]
pub fn tool_calls(content: &str, calls: Vec<ToolCall>) -> Step {
    Step::Respond(Ok(CompletionResponse {
        message: Message::assistant(content).with_tool_calls(calls),
        usage: None,
    }))
}

#[must_use]
pub fn failure(error: ProviderError) -> Step {
    Step::Respond(Err(error))
}

impl ModelProvider for ScriptedProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            model_id: self.model_id.clone(),
        }
    }

    fn complete(
        &self,
        request: CompletionRequest,
        cancel: &CancelSignal,
    ) -> Result<CompletionResponse, ProviderError> {
        lock_unpoisoned(&self.requests).push(request);
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let step = lock_unpoisoned(&self.steps).pop_front();
        match step {
            Some(Step::Respond(outcome)) => outcome,
            Some(Step::HangUntilCancelled) => {
                while !cancel.is_cancelled() {
                    thread::sleep(CANCEL_POLL_INTERVAL);
                }
                Err(ProviderError::Cancelled)
            }
            None => Err(ProviderError::Api {
                message: "mock script exhausted".to_string(),
            }),
        }
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
