//! Terminal coding agent built around skills.
//!
//! The model edits files through `apply_udiff`, runs skill scripts through
//! `run_script` and compacts its own history through `shorten_context`.
//! Skills under `skills/` (and the bundled core tree) contribute scripts,
//! instructions and lifecycle hooks.
//!
//! ## Configuration
//!
//! - `SKILL_AGENT_API_KEY` (falls back to `GEMINI_API_KEY`) is required.
//! - `SKILL_AGENT_BASE_URL`, `SKILL_AGENT_MODEL` and `SKILL_AGENT_FAST_MODEL`
//!   select the OpenAI-compatible endpoint and models.
//! - `SKILL_AGENT_HOME` holds `agent.log` and the `outputs/` directory for
//!   oversized script output (default `~/.skill_agent`).
//! - `SKILL_AGENT_CORE_SKILLS` points at the read-only core skill tree
//!   (default `$SKILL_AGENT_HOME/core_skills`).
//! - `SKILL_AGENT_TIMEOUT_SEC` is an optional HTTP timeout and must be > 0.
//! - `SKILL_AGENT_LOG` takes `tracing` filter directives (default `info`).
//! - `SKILL_AGENT_NO_COLOR=1` disables ANSI colors.
//!
//! Session state lives in the project: `.agent/history.json` is rewritten
//! after every turn and `.agent/errors.log` collects rejected requests.

pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod git;
pub mod logging;
pub mod markdown;
pub mod operator;
pub mod prompt;
pub mod reasoning;
pub mod signals;
pub mod tools;
pub mod turn;
