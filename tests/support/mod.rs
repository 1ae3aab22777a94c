#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use agent_provider::{CancelSignal, ToolCall};
use agent_provider_mock::{ScriptedProvider, Step};
use serde_json::Value;
use session_store::{ErrorLog, SessionStore};
use skill_agent::controller::{
    Approval, CommitMode, ControllerOptions, ControllerParts, ConversationController,
};
use skill_agent::operator::{Operator, OperatorEvent};
use skill_agent::signals::{InterruptAction, InterruptPolicy};
use skill_agent::tools::ToolDispatcher;
use skill_agent::turn::TurnSlot;
use skill_host::{ScriptRunner, SkillRegistry, SkillRoots};
use tempfile::TempDir;
use udiff_engine::UdiffEngine;

/// Scripted reply to a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    /// Cancels the prompt's signal, as an interrupt would, then answers no.
    Interrupt,
    /// Presses Ctrl+C through the turn slot given to `listen_on`, then
    /// answers yes unless the prompt's signal was cancelled.
    CtrlC,
}

/// Records everything shown to the operator and answers prompts from a
/// script. Prompts beyond the script are declined.
#[derive(Default)]
pub struct RecordingOperator {
    events: Mutex<Vec<OperatorEvent>>,
    prompts: Mutex<Vec<String>>,
    answers: Mutex<VecDeque<Answer>>,
    listener: Mutex<Option<TurnSlot>>,
    interrupts: Mutex<Vec<InterruptAction>>,
}

impl RecordingOperator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answering(answers: impl IntoIterator<Item = Answer>) -> Arc<Self> {
        let operator = Self::default();
        lock(&operator.answers).extend(answers);
        Arc::new(operator)
    }

    /// Slot that `Answer::CtrlC` interrupts, as the signal listener does.
    pub fn listen_on(&self, turns: TurnSlot) {
        *lock(&self.listener) = Some(turns);
    }

    pub fn interrupts(&self) -> Vec<InterruptAction> {
        lock(&self.interrupts).clone()
    }

    pub fn events(&self) -> Vec<OperatorEvent> {
        lock(&self.events).clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                OperatorEvent::Notice(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn diagnostics(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                OperatorEvent::Diagnostic(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn saw(&self, event: &OperatorEvent) -> bool {
        lock(&self.events).contains(event)
    }
}

impl Operator for RecordingOperator {
    fn emit(&self, event: OperatorEvent) {
        lock(&self.events).push(event);
    }

    fn confirm(&self, prompt: &str, cancel: &CancelSignal) -> bool {
        lock(&self.prompts).push(prompt.to_string());
        match lock(&self.answers).pop_front() {
            Some(Answer::Yes) => !cancel.is_cancelled(),
            Some(Answer::Interrupt) => {
                cancel.cancel();
                false
            }
            Some(Answer::CtrlC) => {
                if let Some(turns) = lock(&self.listener).as_ref() {
                    let action = InterruptPolicy::default().on_interrupt(turns, Instant::now());
                    lock(&self.interrupts).push(action);
                }
                !cancel.is_cancelled()
            }
            Some(Answer::No) | None => false,
        }
    }
}

/// A temporary project with a `skills/` tree, a core skill tree and a state
/// directory for script sidecars.
pub struct Project {
    _dir: TempDir,
    pub root: PathBuf,
    pub core: PathBuf,
    pub outputs: PathBuf,
}

impl Project {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("project");
        let core = dir.path().join("core");
        let outputs = dir.path().join("state/outputs");
        fs::create_dir_all(root.join("skills")).expect("project skills");
        fs::create_dir_all(&core).expect("core skills");
        let root = root.canonicalize().expect("canonical root");
        Self {
            _dir: dir,
            root,
            core,
            outputs,
        }
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent dir");
        }
        fs::write(path, content).expect("write file");
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.root.join(relative)).expect("read file")
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.root.join(relative).exists()
    }

    /// Writes `skills/<dir>/SKILL.md` and its `scripts/`.
    pub fn write_skill(&self, dir: &str, manifest: &str, scripts: &[(&str, &str)]) {
        write_skill(&self.root.join("skills"), dir, manifest, scripts);
    }

    pub fn write_core_skill(&self, dir: &str, manifest: &str, scripts: &[(&str, &str)]) {
        write_skill(&self.core, dir, manifest, scripts);
    }

    pub fn roots(&self) -> SkillRoots {
        SkillRoots::new(&self.root, Some(self.core.clone())).expect("roots")
    }

    pub fn runner(&self) -> ScriptRunner {
        ScriptRunner::new(self.roots(), &self.outputs)
    }

    pub fn engine(&self) -> UdiffEngine {
        UdiffEngine::new(&self.root, Some(&self.core)).expect("engine")
    }

    pub fn registry(&self) -> SkillRegistry {
        SkillRegistry::scan(&self.roots())
    }

    pub fn store(&self) -> SessionStore {
        SessionStore::for_project(&self.root)
    }

    pub fn error_log(&self) -> ErrorLog {
        ErrorLog::for_project(&self.root)
    }

    pub fn dispatcher(
        &self,
        provider: Arc<ScriptedProvider>,
        operator: Arc<RecordingOperator>,
        approval: Approval,
    ) -> ToolDispatcher {
        ToolDispatcher::new(self.engine(), self.runner(), provider, operator, approval)
    }

    pub fn controller(
        &self,
        provider: Arc<ScriptedProvider>,
        operator: Arc<RecordingOperator>,
        approval: Approval,
    ) -> ConversationController {
        self.controller_with(provider, operator, approval, CommitMode::Off)
    }

    pub fn controller_with(
        &self,
        provider: Arc<ScriptedProvider>,
        operator: Arc<RecordingOperator>,
        approval: Approval,
        commit: CommitMode,
    ) -> ConversationController {
        ConversationController::new(ControllerParts {
            provider,
            operator,
            engine: self.engine(),
            runner: self.runner(),
            store: self.store(),
            error_log: self.error_log(),
            options: ControllerOptions {
                approval,
                commit,
                fast_model: "fast-model".to_string(),
            },
        })
    }
}

fn write_skill(tree: &Path, dir: &str, manifest: &str, scripts: &[(&str, &str)]) {
    let skill_dir = tree.join(dir);
    fs::create_dir_all(skill_dir.join("scripts")).expect("skill dir");
    fs::write(skill_dir.join("SKILL.md"), manifest).expect("manifest");
    for (name, body) in scripts {
        fs::write(skill_dir.join("scripts").join(name), body).expect("script");
    }
}

pub fn provider(steps: impl IntoIterator<Item = Step>) -> Arc<ScriptedProvider> {
    Arc::new(ScriptedProvider::new(steps))
}

pub fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall::function(id, name, arguments.to_string())
}

pub fn bash_available() -> bool {
    std::process::Command::new("bash")
        .arg("-c")
        .arg("true")
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
