use std::fmt;
use std::path::Path;
use std::str::FromStr;

use agent_provider::CancelSignal;

use crate::manifest::INJECT_MANIFEST_BODY;
use crate::registry::{Skill, SkillRegistry};
use crate::script::ScriptRunner;

/// Lifecycle points at which skills may run hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookEvent {
    Startup,
    PreEdit,
    PostEdit,
    PreRun,
    PostRun,
    PreView,
    PostView,
    PreCommit,
}

impl HookEvent {
    pub const ALL: [Self; 8] = [
        Self::Startup,
        Self::PreEdit,
        Self::PostEdit,
        Self::PreRun,
        Self::PostRun,
        Self::PreView,
        Self::PostView,
        Self::PreCommit,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::PreEdit => "pre_edit",
            Self::PostEdit => "post_edit",
            Self::PreRun => "pre_run",
            Self::PostRun => "post_run",
            Self::PreView => "pre_view",
            Self::PostView => "post_view",
            Self::PreCommit => "pre_commit",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookEvent {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == value)
            .ok_or_else(|| format!("unsupported hook event: {value}"))
    }
}

/// What a hook does, decided when the manifest is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookAction {
    /// Runs a script. Tokens may contain `{skill_path}` and context
    /// placeholders; a relative program is resolved against the skill directory.
    RunScript { program: String, args: Vec<String> },
    /// Folds the manifest body into the next system message.
    InjectManifestBody,
}

impl HookAction {
    pub(crate) fn parse(template: &str) -> Result<Self, String> {
        if template == INJECT_MANIFEST_BODY {
            return Ok(Self::InjectManifestBody);
        }
        let mut tokens = shell_words::split(template)
            .map_err(|error| error.to_string())?
            .into_iter();
        let program = tokens.next().ok_or_else(|| "empty command".to_string())?;
        Ok(Self::RunScript {
            program,
            args: tokens.collect(),
        })
    }
}

/// Placeholder values available to hook templates, e.g. `path` for `{path}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookContext {
    values: Vec<(&'static str, String)>,
}

impl HookContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.values.push((key, value.into()));
        self
    }

    fn substitute(&self, token: &str, skill_dir: &Path) -> String {
        let mut rendered = token.replace("{skill_path}", &skill_dir.to_string_lossy());
        for (key, value) in &self.values {
            rendered = rendered.replace(&format!("{{{key}}}"), value);
        }
        rendered
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Output(String),
    Failed(String),
    Injected(String),
}

/// Result of one skill's hook for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookEntry {
    pub skill: String,
    pub event: HookEvent,
    pub outcome: HookOutcome,
}

/// Combined results of every hook bound to one event, in registry order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookReport {
    pub entries: Vec<HookEntry>,
}

impl HookReport {
    /// Script output and failures, each attributed to its skill.
    #[must_use]
    pub fn output(&self) -> String {
        let mut rendered = String::new();
        for entry in &self.entries {
            match &entry.outcome {
                HookOutcome::Output(output) if !output.is_empty() => {
                    rendered.push_str(&format!(
                        "Hook '{}' (skill: {}) output:\n{output}\n",
                        entry.event, entry.skill
                    ));
                }
                HookOutcome::Failed(error) => {
                    rendered.push_str(&format!(
                        "Hook '{}' (skill: {}) failed: {error}\n",
                        entry.event, entry.skill
                    ));
                }
                HookOutcome::Output(_) | HookOutcome::Injected(_) => {}
            }
        }
        rendered
    }

    /// Manifest bodies requested by `inject_skill_md` hooks.
    #[must_use]
    pub fn injections(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|entry| match &entry.outcome {
                HookOutcome::Injected(body) => {
                    Some(format!("[Skill: {} Instructions]\n{body}", entry.skill))
                }
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn failures(&self) -> impl Iterator<Item = &HookEntry> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.outcome, HookOutcome::Failed(_)))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.output().is_empty() && self.injections().is_empty()
    }
}

/// Runs the hooks skills declare for lifecycle events.
///
/// Hooks are advisory: a failing hook is recorded in the report and the
/// remaining hooks still run.
#[derive(Debug, Clone, Copy)]
pub struct HookDispatcher<'a> {
    runner: &'a ScriptRunner,
}

impl<'a> HookDispatcher<'a> {
    #[must_use]
    pub fn new(runner: &'a ScriptRunner) -> Self {
        Self { runner }
    }

    pub fn dispatch(
        &self,
        registry: &SkillRegistry,
        event: HookEvent,
        context: &HookContext,
        cancel: &CancelSignal,
    ) -> HookReport {
        let mut report = HookReport::default();
        for (skill, action) in registry.bound_to(event) {
            let outcome = match action {
                HookAction::InjectManifestBody => inject(skill),
                HookAction::RunScript { program, args } => {
                    self.run_script(skill, program, args, context, cancel)
                }
            };
            if let HookOutcome::Failed(error) = &outcome {
                tracing::warn!(skill = %skill.name, %event, %error, "hook failed");
            }
            report.entries.push(HookEntry {
                skill: skill.name.clone(),
                event,
                outcome,
            });
        }
        report
    }

    fn run_script(
        &self,
        skill: &Skill,
        program: &str,
        args: &[String],
        context: &HookContext,
        cancel: &CancelSignal,
    ) -> HookOutcome {
        let program = context.substitute(program, &skill.dir);
        let program = if Path::new(&program).is_absolute() {
            program
        } else {
            skill.dir.join(&program).to_string_lossy().into_owned()
        };
        let args: Vec<String> = args
            .iter()
            .map(|arg| context.substitute(arg, &skill.dir))
            .collect();

        tracing::info!(skill = %skill.name, program = %program, ?args, "running hook");
        match self.runner.run(&program, &args, cancel) {
            Ok(output) => HookOutcome::Output(output),
            Err(error) => HookOutcome::Failed(error.to_string()),
        }
    }
}

fn inject(skill: &Skill) -> HookOutcome {
    match skill.read_body() {
        Ok(body) => HookOutcome::Injected(body),
        Err(error) => HookOutcome::Failed(format!("failed to read skill body: {error}")),
    }
}
