//! Execution of model-requested tool calls.
//!
//! A batch runs strictly in emission order. Every call receives exactly one
//! tool-role response unless `shorten_context` resets the history, after
//! which the remaining calls of that batch are dropped.

use std::sync::Arc;

use agent_provider::{CancelSignal, CompletionRequest, Message, ModelProvider, ProviderError, ToolCall};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use skill_host::{HookContext, HookDispatcher, HookEvent, HookReport, ScriptError, ScriptRunner, SkillRegistry};
use udiff_engine::{UdiffEngine, UdiffError};

use crate::operator::{Operator, OperatorEvent};
use crate::prompt::summary_prompt;
use crate::reasoning::payload_thought;

pub const APPLY_UDIFF: &str = "apply_udiff";
pub const RUN_SCRIPT: &str = "run_script";
pub const SHORTEN_CONTEXT: &str = "shorten_context";

const EMPTY_SUMMARY: &str = "(No summary provided by the model)";

/// How proposed edits are approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    Auto,
    Manual,
}

/// A tool call with its arguments decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    ApplyUdiff {
        path: String,
        diff: String,
    },
    RunScript {
        path: String,
        args: Vec<String>,
    },
    ShortenContext {
        task_description: String,
        future_plans: String,
        vital_information: String,
    },
}

#[derive(Deserialize)]
struct ApplyUdiffArgs {
    path: String,
    diff: String,
}

#[derive(Deserialize)]
struct RunScriptArgs {
    path: String,
    #[serde(default)]
    args: Vec<String>,
}

#[derive(Deserialize)]
struct ShortenContextArgs {
    task_description: String,
    future_plans: String,
    vital_information: String,
}

impl ToolInvocation {
    pub fn parse(name: &str, arguments: &str) -> Result<Self, ToolError> {
        match name {
            APPLY_UDIFF => {
                let ApplyUdiffArgs { path, diff } = decode(arguments)?;
                Ok(Self::ApplyUdiff { path, diff })
            }
            RUN_SCRIPT => {
                let RunScriptArgs { path, args } = decode(arguments)?;
                Ok(Self::RunScript { path, args })
            }
            SHORTEN_CONTEXT => {
                let ShortenContextArgs {
                    task_description,
                    future_plans,
                    vital_information,
                } = decode(arguments)?;
                Ok(Self::ShortenContext {
                    task_description,
                    future_plans,
                    vital_information,
                })
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

fn decode<T: DeserializeOwned>(arguments: &str) -> Result<T, ToolError> {
    serde_json::from_str(arguments).map_err(ToolError::Arguments)
}

/// Failure of one call. Its `Display` becomes the tool response after an
/// `Error: ` prefix.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("error parsing arguments: {0}")]
    Arguments(#[source] serde_json::Error),
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error(transparent)]
    Patch(#[from] UdiffError),
    /// Script failure, already rendered with any policy guidance.
    #[error("{0}")]
    Script(String),
    #[error("interrupted by user")]
    Interrupted,
    #[error("failed to summarize: {0}")]
    Summary(#[source] ProviderError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Completed,
    /// `shorten_context` replaced the history; the turn is over.
    ContextReset,
    Interrupted,
}

enum CallResult {
    Respond(String),
    Reset,
}

pub struct ToolDispatcher {
    engine: UdiffEngine,
    runner: ScriptRunner,
    provider: Arc<dyn ModelProvider>,
    operator: Arc<dyn Operator>,
    approval: Approval,
}

impl ToolDispatcher {
    pub fn new(
        engine: UdiffEngine,
        runner: ScriptRunner,
        provider: Arc<dyn ModelProvider>,
        operator: Arc<dyn Operator>,
        approval: Approval,
    ) -> Self {
        Self {
            engine,
            runner,
            provider,
            operator,
            approval,
        }
    }

    pub fn runner(&self) -> &ScriptRunner {
        &self.runner
    }

    pub fn hooks(&self) -> HookDispatcher<'_> {
        HookDispatcher::new(&self.runner)
    }

    /// Runs `calls` in order, appending one tool response per call to
    /// `messages`. Instructions injected by hooks are appended afterwards as
    /// a single system message.
    pub fn run_batch(
        &self,
        calls: &[ToolCall],
        messages: &mut Vec<Message>,
        registry: &SkillRegistry,
        cancel: &CancelSignal,
    ) -> BatchOutcome {
        let mut injections = Vec::new();

        for call in calls {
            if cancel.is_cancelled() {
                messages.push(Message::tool(
                    call.id.clone(),
                    format!("Error: {}", ToolError::Interrupted),
                ));
                continue;
            }

            if let Some(thought) = payload_thought(call.extra_content.as_ref()) {
                self.operator.emit(OperatorEvent::Thought(thought.to_string()));
            }
            self.operator
                .emit(OperatorEvent::ToolCall(call.name().to_string()));

            let result = ToolInvocation::parse(call.name(), &call.function.arguments).and_then(
                |invocation| self.execute(invocation, messages, registry, cancel, &mut injections),
            );
            match result {
                Ok(CallResult::Respond(content)) => {
                    messages.push(Message::tool(call.id.clone(), content));
                }
                Ok(CallResult::Reset) => {
                    tracing::info!(tool_call_id = %call.id, "history reset by shorten_context");
                    return BatchOutcome::ContextReset;
                }
                Err(error) => {
                    tracing::warn!(tool = %call.name(), %error, "tool call failed");
                    self.operator
                        .emit(OperatorEvent::Diagnostic(format!("Tool Error: {error}")));
                    messages.push(Message::tool(call.id.clone(), format!("Error: {error}")));
                }
            }
        }

        if !injections.is_empty() {
            messages.push(Message::system(injections.join("\n\n")));
        }

        if cancel.is_cancelled() {
            BatchOutcome::Interrupted
        } else {
            BatchOutcome::Completed
        }
    }

    fn execute(
        &self,
        invocation: ToolInvocation,
        messages: &mut Vec<Message>,
        registry: &SkillRegistry,
        cancel: &CancelSignal,
        injections: &mut Vec<String>,
    ) -> Result<CallResult, ToolError> {
        match invocation {
            ToolInvocation::ApplyUdiff { path, diff } => self
                .apply_udiff(&path, &diff, registry, cancel, injections)
                .map(CallResult::Respond),
            ToolInvocation::RunScript { path, args } => self
                .run_script(&path, &args, registry, cancel, injections)
                .map(CallResult::Respond),
            ToolInvocation::ShortenContext {
                task_description,
                future_plans,
                vital_information,
            } => {
                self.shorten_context(
                    messages,
                    &task_description,
                    &future_plans,
                    &vital_information,
                    cancel,
                )?;
                Ok(CallResult::Reset)
            }
        }
    }

    fn apply_udiff(
        &self,
        path: &str,
        diff: &str,
        registry: &SkillRegistry,
        cancel: &CancelSignal,
        injections: &mut Vec<String>,
    ) -> Result<String, ToolError> {
        let preview = self.engine.dry_run(path, diff)?;
        self.operator.emit(OperatorEvent::ProposedEdit {
            path: path.to_string(),
            diff: diff.to_string(),
            preview: preview.unified(path),
        });

        let approved = match self.approval {
            Approval::Auto => {
                self.operator
                    .emit(OperatorEvent::Notice("Auto-approving changes...".to_string()));
                true
            }
            Approval::Manual => self
                .operator
                .confirm("Apply these changes? [y/N]: ", cancel),
        };
        if cancel.is_cancelled() {
            return Err(ToolError::Interrupted);
        }
        if !approved {
            self.operator
                .emit(OperatorEvent::Notice("Changes rejected.".to_string()));
            return Ok("User rejected the changes.".to_string());
        }

        let context = HookContext::new().with("path", path);
        let pre = self.run_hooks(registry, HookEvent::PreEdit, &context, cancel, injections);
        if cancel.is_cancelled() {
            return Err(ToolError::Interrupted);
        }

        let result = match self.engine.apply(path, diff) {
            Ok(_) => {
                self.operator.emit(OperatorEvent::Notice(format!(
                    "Successfully applied diff to {path}"
                )));
                "Diff applied successfully.".to_string()
            }
            Err(error) => {
                self.operator
                    .emit(OperatorEvent::Diagnostic(format!("Tool Error: {error}")));
                format!("Error: {error}")
            }
        };

        let post = self.run_hooks(registry, HookEvent::PostEdit, &context, cancel, injections);
        Ok(fold_hook_output("Pre-Edit Hook Output", &pre, result, &post))
    }

    fn run_script(
        &self,
        path: &str,
        args: &[String],
        registry: &SkillRegistry,
        cancel: &CancelSignal,
        injections: &mut Vec<String>,
    ) -> Result<String, ToolError> {
        let context = HookContext::new()
            .with("path", path)
            .with("args", args.join(" "));
        let pre = self.run_hooks(registry, HookEvent::PreRun, &context, cancel, injections);

        self.operator.emit(OperatorEvent::Notice(format!(
            "Executing script: {path} {args:?}"
        )));
        let result = self.runner.run(path, args, cancel);
        let post = self.run_hooks(registry, HookEvent::PostRun, &context, cancel, injections);

        match result {
            Ok(output) => Ok(fold_hook_output("Pre-Run Hook Output", &pre, output, &post)),
            Err(ScriptError::Cancelled) => Err(ToolError::Interrupted),
            Err(error) => Err(ToolError::Script(
                error.with_guidance(&registry.prompt_fragment()),
            )),
        }
    }

    fn shorten_context(
        &self,
        messages: &mut Vec<Message>,
        task: &str,
        plans: &str,
        vital: &str,
        cancel: &CancelSignal,
    ) -> Result<(), ToolError> {
        self.operator
            .emit(OperatorEvent::Notice("Summarizing context...".to_string()));

        let prompt = summary_prompt(messages, task, plans, vital);
        let request = CompletionRequest::plain(vec![Message::user(prompt)]);
        let response = {
            let _spinner = self.operator.wait_indicator();
            self.provider.complete(request, cancel)
        };
        let response = match response {
            Ok(response) => response,
            Err(ProviderError::Cancelled) => return Err(ToolError::Interrupted),
            Err(error) => return Err(ToolError::Summary(error)),
        };

        let summary = if response.message.content.trim().is_empty() {
            EMPTY_SUMMARY.to_string()
        } else {
            response.message.content
        };

        messages.truncate(1);
        messages.push(Message::user(format!(
            "Context has been shortened. Summary of previous conversation:\n{summary}"
        )));
        self.operator.emit(OperatorEvent::Summary(summary));
        Ok(())
    }

    fn run_hooks(
        &self,
        registry: &SkillRegistry,
        event: HookEvent,
        context: &HookContext,
        cancel: &CancelSignal,
        injections: &mut Vec<String>,
    ) -> String {
        let report = self.hooks().dispatch(registry, event, context, cancel);
        report_hook_failures(self.operator.as_ref(), &report);
        injections.extend(report.injections());
        report.output()
    }
}

/// Shows each failed hook to the operator; the failure text also stays in
/// the report output that reaches the model.
pub(crate) fn report_hook_failures(operator: &dyn Operator, report: &HookReport) {
    for entry in report.failures() {
        if let skill_host::HookOutcome::Failed(error) = &entry.outcome {
            operator.emit(OperatorEvent::Diagnostic(format!(
                "[Hook Error] {} ({}): {error}",
                entry.skill, entry.event
            )));
        }
    }
}

fn fold_hook_output(pre_label: &str, pre: &str, result: String, post: &str) -> String {
    let mut content = if pre.is_empty() {
        result
    } else {
        format!("[{pre_label}]\n{pre}\n\n{result}")
    };
    if !post.is_empty() {
        content.push_str("\n\n[Hook Output]\n");
        content.push_str(post);
    }
    content
}
