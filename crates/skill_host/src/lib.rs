//! Skill discovery, script execution and lifecycle hooks.
//!
//! A skill is a directory holding a `SKILL.md` manifest and optional
//! `scripts/`. Skills come from two trees: the bundled core tree (read-only)
//! and the project's `skills/` directory, which shadows core entries by name.
//!
//! [`SkillRegistry`] is a plain value produced by scanning both trees; callers
//! own it and compare successive scans to detect new skills.
//! [`ScriptRunner`] is the only way scripts are executed, for explicit calls
//! and hooks alike, so the path policy in [`SkillRoots`] applies uniformly.

mod error;
mod hooks;
mod manifest;
mod registry;
mod roots;
mod script;

pub use error::{ManifestError, ScriptError, SkillLoadError};
pub use hooks::{HookAction, HookContext, HookDispatcher, HookEntry, HookEvent, HookOutcome, HookReport};
pub use manifest::{parse_manifest, Manifest, INJECT_MANIFEST_BODY};
pub use registry::{discover, load_skill, Skill, SkillOrigin, SkillRegistry};
pub use roots::SkillRoots;
pub use script::{ScriptRunner, MAX_OUTPUT_CHARS};
