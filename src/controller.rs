//! The conversation turn loop.
//!
//! A turn starts with one user input and alternates model requests with tool
//! batches until a response carries no tool calls. Only one turn is in
//! flight; its cancellation handle lives in the shared [`TurnSlot`] so the
//! interrupt listener can reach it.

use std::sync::Arc;

use agent_provider::{
    CancelSignal, CompletionRequest, Message, ModelProvider, ProviderError, ProviderProfile, Role,
    ToolDefinition,
};
use session_store::{ErrorLog, SessionStore, SessionStoreError};
use skill_host::{HookContext, HookEvent, ScriptRunner, SkillRegistry};
use udiff_engine::UdiffEngine;

use crate::commands::{parse_slash_command, SlashCommand, HELP_TEXT};
use crate::git::{CommitFlow, GitRepo};
use crate::operator::{Operator, OperatorEvent};
use crate::prompt::{
    startup_message, system_prompt, tool_definitions, COMPACTION_REQUEST, TOKEN_BUDGET,
};
use crate::reasoning::{payload_thought, split_inline_thoughts};
use crate::tools::{report_hook_failures, BatchOutcome, ToolDispatcher};
use crate::turn::{ActiveTurn, TurnSlot};

pub use crate::tools::Approval;

/// Whether a commit is proposed after a turn that leaves the tree dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    Off,
    Propose,
    /// Commit without asking.
    Force,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    pub approval: Approval,
    pub commit: CommitMode,
    /// Model used for commit messages.
    pub fast_model: String,
}

/// Everything a controller is assembled from.
pub struct ControllerParts {
    pub provider: Arc<dyn ModelProvider>,
    pub operator: Arc<dyn Operator>,
    pub engine: UdiffEngine,
    pub runner: ScriptRunner,
    pub store: SessionStore,
    pub error_log: ErrorLog,
    pub options: ControllerOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model answered without tool calls.
    Completed,
    /// `shorten_context` replaced the history.
    ContextReset,
    Interrupted,
    /// The provider failed; the history keeps everything up to the failure.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Blank input.
    Idle,
    Command,
    Turn(TurnOutcome),
    Exit,
}

pub struct ConversationController {
    provider: Arc<dyn ModelProvider>,
    profile: ProviderProfile,
    operator: Arc<dyn Operator>,
    dispatcher: ToolDispatcher,
    store: SessionStore,
    error_log: ErrorLog,
    git: GitRepo,
    options: ControllerOptions,
    tools: Vec<ToolDefinition>,
    registry: SkillRegistry,
    messages: Vec<Message>,
    turns: TurnSlot,
    last_usage: u64,
    pending_input: Option<String>,
}

impl ConversationController {
    /// Discovers skills, builds the system prompt and runs the `startup`
    /// hooks, whose output becomes a second system message.
    pub fn new(parts: ControllerParts) -> Self {
        let ControllerParts {
            provider,
            operator,
            engine,
            runner,
            store,
            error_log,
            options,
        } = parts;

        let registry = SkillRegistry::scan(runner.roots());
        let git = GitRepo::new(runner.roots().project_root());
        let dispatcher = ToolDispatcher::new(
            engine,
            runner,
            Arc::clone(&provider),
            Arc::clone(&operator),
            options.approval,
        );

        let mut messages = vec![Message::system(system_prompt(&registry))];
        let startup = dispatcher.hooks().dispatch(
            &registry,
            HookEvent::Startup,
            &HookContext::new(),
            &CancelSignal::new(),
        );
        report_hook_failures(operator.as_ref(), &startup);
        messages.extend(startup_message(&startup));
        let profile = provider.profile();
        tracing::info!(
            provider = %profile.provider_id,
            model = %profile.model_id,
            skills = registry.len(),
            "controller ready"
        );

        Self {
            provider,
            profile,
            operator,
            dispatcher,
            store,
            error_log,
            git,
            options,
            tools: tool_definitions(),
            registry,
            messages,
            turns: TurnSlot::new(),
            last_usage: 0,
            pending_input: None,
        }
    }

    /// Appends the non-system messages of the saved session after the fresh
    /// system prompt.
    pub fn resume(&mut self) -> Result<usize, SessionStoreError> {
        let restored: Vec<Message> = self
            .store
            .load()?
            .into_iter()
            .filter(|message| message.role != Role::System)
            .collect();
        let count = restored.len();
        self.messages.extend(restored);
        if count > 0 {
            self.notice(format!("Loaded {count} messages from history."));
        }
        tracing::info!(count, path = %self.store.path().display(), "session resumed");
        Ok(count)
    }

    /// Handles one line of operator input: a slash command or a full turn.
    /// The history is saved after every turn; failing to save is fatal.
    pub fn handle_input(&mut self, input: &str) -> Result<Flow, SessionStoreError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Flow::Idle);
        }
        if let Some(command) = parse_slash_command(input) {
            return self.run_command(command);
        }

        let start = self.messages.len();
        let outcome = self.run_turn(input);
        tracing::info!(?outcome, messages = self.messages.len(), "turn finished");

        self.offer_commit(start);
        self.offer_compaction();
        self.store.save(&self.messages)?;
        Ok(Flow::Turn(outcome))
    }

    /// Input queued for the next turn, such as an accepted compaction offer.
    pub fn take_pending_input(&mut self) -> Option<String> {
        self.pending_input.take()
    }

    /// Handle the interrupt listener uses to cancel the active turn.
    #[must_use]
    pub fn turns(&self) -> TurnSlot {
        self.turns.clone()
    }

    #[must_use]
    pub fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn registry(&self) -> &SkillRegistry {
        &self.registry
    }

    fn run_turn(&mut self, input: &str) -> TurnOutcome {
        let turn = match self.turns.begin() {
            Ok(turn) => turn,
            Err(busy) => {
                self.diagnostic(busy.to_string());
                return TurnOutcome::Failed;
            }
        };
        let cancel = turn.signal().clone();
        self.last_usage = 0;
        self.messages.push(Message::user(input));

        loop {
            if cancel.is_cancelled() {
                return TurnOutcome::Interrupted;
            }

            let request = CompletionRequest::turn(self.messages.clone(), self.tools.clone());
            let response = {
                let _spinner = self.operator.wait_indicator();
                self.provider.complete(request, &cancel)
            };
            let response = match response {
                Ok(response) => response,
                Err(error) => return self.provider_failure(error),
            };

            if let Some(usage) = response.usage {
                self.last_usage = usage.total_tokens;
            }
            let message = response.message;
            self.present(&message);
            self.messages.push(message.clone());
            if !message.has_tool_calls() {
                return TurnOutcome::Completed;
            }

            let outcome = self.dispatcher.run_batch(
                &message.tool_calls,
                &mut self.messages,
                &self.registry,
                &cancel,
            );
            match outcome {
                BatchOutcome::ContextReset => return TurnOutcome::ContextReset,
                BatchOutcome::Interrupted => {
                    self.refresh_skills();
                    return TurnOutcome::Interrupted;
                }
                BatchOutcome::Completed => self.refresh_skills(),
            }
        }
    }

    fn provider_failure(&self, error: ProviderError) -> TurnOutcome {
        match error {
            ProviderError::Cancelled => {
                self.notice("\nRequest canceled.".to_string());
                TurnOutcome::Interrupted
            }
            ProviderError::BadRequest { body } => {
                self.diagnostic(format!("API Error (Status 400): {body}"));
                match self.error_log.record(&body, &self.messages) {
                    Ok(()) => self.notice(format!(
                        "Logging to {}",
                        self.error_log.path().display()
                    )),
                    Err(log_error) => {
                        tracing::warn!(%log_error, "failed to write error log");
                        self.diagnostic(format!("Failed to write error log: {log_error}"));
                    }
                }
                TurnOutcome::Failed
            }
            other => {
                tracing::warn!(error = %other, "model request failed");
                self.diagnostic(other.to_string());
                TurnOutcome::Failed
            }
        }
    }

    /// Shows the reasoning attached to a response and, for a final answer,
    /// the reply with inline thought blocks removed.
    fn present(&self, message: &Message) {
        let split = split_inline_thoughts(&message.content);
        for thought in split.thoughts {
            self.operator.emit(OperatorEvent::Thought(thought));
        }
        if let Some(thought) = payload_thought(message.extra_content.as_ref()) {
            self.operator
                .emit(OperatorEvent::Thought(thought.to_string()));
        }
        if !message.has_tool_calls() {
            let visible = split.visible.trim();
            if !visible.is_empty() {
                self.operator
                    .emit(OperatorEvent::Reply(visible.to_string()));
            }
        }
    }

    /// Rescans both skill trees and tells the model about new names.
    fn refresh_skills(&mut self) {
        let current = SkillRegistry::scan(self.dispatcher.runner().roots());
        let added: Vec<String> = current
            .added_since(&self.registry)
            .into_iter()
            .map(|skill| format!("- {}: {}\n", skill.name, skill.description))
            .collect();
        self.registry = current;
        if added.is_empty() {
            return;
        }

        let notice = format!("SYSTEM NOTICE: New skills discovered:\n{}", added.concat());
        tracing::info!(count = added.len(), "new skills discovered");
        self.messages.push(Message::system(notice.clone()));
        self.notice(notice);
    }

    fn offer_commit(&self, turn_start: usize) {
        if self.options.commit == CommitMode::Off || !self.git.is_dirty() {
            return;
        }
        let history = match self.messages.get(turn_start..) {
            Some(turn) if !turn.is_empty() => turn,
            _ => self.messages.get(1..).unwrap_or_default(),
        };
        let force = self.options.commit == CommitMode::Force;
        let Some(window) = self.prompt_window() else {
            return;
        };
        if let Err(error) = self.commit_flow().propose(history, force, window.signal()) {
            self.diagnostic(format!("Git commit workflow failed: {error}"));
        }
    }

    fn offer_compaction(&mut self) {
        if self.last_usage <= TOKEN_BUDGET || self.messages.len() <= 2 {
            return;
        }
        self.notice(format!(
            "\n[System] Context size is {} tokens (>400,000).",
            self.last_usage
        ));
        let Some(window) = self.prompt_window() else {
            return;
        };
        let accepted = self.operator.confirm(
            "Would you like to ask the model to shorten the context? [y/N]: ",
            window.signal(),
        );
        if accepted && !window.signal().is_cancelled() {
            self.pending_input = Some(COMPACTION_REQUEST.to_string());
        }
    }

    /// Registers a prompt outside a model turn in the turn slot, so an
    /// interrupt cancels it instead of arming exit.
    fn prompt_window(&self) -> Option<ActiveTurn> {
        match self.turns.begin() {
            Ok(window) => Some(window),
            Err(busy) => {
                self.diagnostic(busy.to_string());
                None
            }
        }
    }

    fn commit_flow(&self) -> CommitFlow<'_> {
        CommitFlow {
            repo: &self.git,
            provider: self.provider.as_ref(),
            operator: self.operator.as_ref(),
            hooks: self.dispatcher.hooks(),
            registry: &self.registry,
            fast_model: &self.options.fast_model,
        }
    }

    fn run_command(&mut self, command: SlashCommand) -> Result<Flow, SessionStoreError> {
        match command {
            SlashCommand::Help => self.notice(HELP_TEXT.to_string()),
            SlashCommand::Clear => {
                self.messages = vec![Message::system(system_prompt(&self.registry))];
                self.store.save(&self.messages)?;
                self.notice("Conversation history cleared.".to_string());
            }
            SlashCommand::Commit => {
                if self.git.is_dirty() {
                    let history: Vec<Message> = self
                        .messages
                        .iter()
                        .filter(|message| message.role != Role::System)
                        .cloned()
                        .collect();
                    if let Some(window) = self.prompt_window() {
                        let proposal = self
                            .commit_flow()
                            .propose(&history, false, window.signal());
                        if let Err(error) = proposal {
                            self.diagnostic(format!("Error: {error}"));
                        }
                    }
                } else {
                    self.notice("Nothing to commit (working directory clean).".to_string());
                }
            }
            SlashCommand::Skills => {
                let mut listing = String::from("Available Skills:");
                for skill in self.registry.iter() {
                    listing.push_str(&format!("\n- {}", skill.name));
                    if let Some(version) = &skill.version {
                        listing.push_str(&format!(" (v{version})"));
                    }
                    listing.push_str(&format!(": {}", skill.description));
                }
                self.notice(listing);
            }
            SlashCommand::History => {
                self.notice(format!("History contains {} messages.", self.messages.len()));
            }
            SlashCommand::Exit => {
                self.notice("Exiting...".to_string());
                return Ok(Flow::Exit);
            }
            SlashCommand::Unknown(name) => self.notice(format!("Unknown command: {name}")),
        }
        Ok(Flow::Command)
    }

    fn notice(&self, text: String) {
        self.operator.emit(OperatorEvent::Notice(text));
    }

    fn diagnostic(&self, text: String) {
        self.operator.emit(OperatorEvent::Diagnostic(text));
    }
}
