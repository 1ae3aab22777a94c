//! Git commit proposals at the end of a turn.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use agent_provider::{CancelSignal, CompletionRequest, Message, ModelProvider, ProviderError};
use skill_host::{HookContext, HookDispatcher, HookEvent, SkillRegistry};

use crate::operator::{Operator, OperatorEvent};
use crate::prompt::{commit_transcript, COMMIT_SYSTEM_PROMPT};
use crate::tools::report_hook_failures;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("failed to run git: {0}")]
    Spawn(#[from] io::Error),
    #[error("git commit failed: {status}\n{output}")]
    Commit { status: String, output: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("no conversation history available to generate commit message")]
    EmptyHistory,
    #[error("failed to generate commit message: {0}")]
    Message(#[source] ProviderError),
    #[error(transparent)]
    Git(#[from] GitError),
}

/// The repository the agent works in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True when `git status --porcelain` lists anything. Outside a
    /// repository, or when git is missing, the tree counts as clean.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        let output = Command::new("git")
            .current_dir(&self.root)
            .args(["status", "--porcelain"])
            .output();
        match output {
            Ok(out) => out.status.success() && !out.stdout.trim_ascii().is_empty(),
            Err(_) => false,
        }
    }

    /// Commits tracked changes only; untracked files are never staged.
    pub fn commit_all(&self, message: &str) -> Result<(), GitError> {
        let output = Command::new("git")
            .current_dir(&self.root)
            .args(["commit", "-am", message])
            .output()?;
        if output.status.success() {
            return Ok(());
        }
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(GitError::Commit {
            status: output.status.to_string(),
            output: combined,
        })
    }
}

/// Collaborators of one commit proposal.
pub struct CommitFlow<'a> {
    pub repo: &'a GitRepo,
    pub provider: &'a dyn ModelProvider,
    pub operator: &'a dyn Operator,
    pub hooks: HookDispatcher<'a>,
    pub registry: &'a SkillRegistry,
    pub fast_model: &'a str,
}

impl CommitFlow<'_> {
    /// Asks the fast model for a message describing `history`, runs the
    /// `pre_commit` hooks and commits, after confirmation unless `force`.
    /// Cancelling `cancel` aborts the request, the hooks or the prompt.
    pub fn propose(
        &self,
        history: &[Message],
        force: bool,
        cancel: &CancelSignal,
    ) -> Result<(), CommitError> {
        let message = self.commit_message(history, cancel)?;

        let report = self.hooks.dispatch(
            self.registry,
            HookEvent::PreCommit,
            &HookContext::new().with("message", message.clone()),
            cancel,
        );
        report_hook_failures(self.operator, &report);
        let hook_output = report.output();
        if !hook_output.is_empty() {
            self.notice(format!("\n[Pre-Commit Hook Output]\n{hook_output}"));
        }

        self.notice(format!("\n[Git] Proposed commit message: {message}"));
        let confirmed = force || self.operator.confirm("Commit these changes? [y/N]: ", cancel);
        if confirmed && !cancel.is_cancelled() {
            self.repo.commit_all(&message)?;
            tracing::info!(%message, "committed");
            self.notice("Changes committed successfully.".to_string());
        } else {
            self.notice("Commit aborted.".to_string());
        }
        Ok(())
    }

    fn commit_message(
        &self,
        history: &[Message],
        cancel: &CancelSignal,
    ) -> Result<String, CommitError> {
        let transcript = commit_transcript(history);
        if transcript.is_empty() {
            return Err(CommitError::EmptyHistory);
        }

        let request = CompletionRequest::plain(vec![
            Message::system(COMMIT_SYSTEM_PROMPT),
            Message::user(transcript),
        ])
        .with_model(self.fast_model);
        let response = {
            let _spinner = self.operator.wait_indicator();
            self.provider.complete(request, cancel)
        };
        response
            .map(|response| response.message.content.trim().to_string())
            .map_err(CommitError::Message)
    }

    fn notice(&self, text: String) {
        self.operator.emit(OperatorEvent::Notice(text));
    }
}
