//! Model-facing text: the system prompt, tool schemas and the auxiliary
//! prompts used for summaries and commit messages.

use std::fmt::Write as _;

use agent_provider::{Message, ToolDefinition};
use serde_json::json;
use skill_host::{HookReport, SkillRegistry};

use crate::tools::{APPLY_UDIFF, RUN_SCRIPT, SHORTEN_CONTEXT};

/// Usage above this many tokens triggers the compaction offer.
pub const TOKEN_BUDGET: u64 = 400_000;

pub const COMPACTION_REQUEST: &str = "The context size has exceeded 400,000 tokens. \
Please use the 'shorten_context' tool to summarize the conversation and reset the context.";

pub const COMMIT_SYSTEM_PROMPT: &str = "You are an expert developer. Generate a tight git commit \
message (less than 15 words) describing the changes made in the provided conversation history. \
Output ONLY the commit message. Do not use markdown or quotes.";

const BASE_INSTRUCTIONS: &str = "\
You can edit files and execute scripts through tools; scripts give you full shell access.

Editing with 'apply_udiff':
- Begin every hunk with an '@@ ... @@' line. Line numbers in the header are ignored; leave them out.
- Prefix unchanged context with ' ', removed lines with '-', added lines with '+'.
- Context is mandatory. Surround every change with at least 2 lines copied verbatim from the file.
  A hunk made only of '+' lines is rejected unless the file does not exist yet.
- The search text of each hunk must occur exactly once in the file. When a patch fails, it is almost
  always because the context is too short or does not match; add more unique context and retry.
- Prefer replacing whole blocks or functions over tiny edits inside them.
- A file that does not exist is treated as empty.

Working with the shell:
- Explore with 'ls -R', 'find' and 'grep'. When searching for code you intend to edit, use 'grep -C 5'
  so you have enough surrounding lines for a unique patch.
- Inspect files with 'cat', 'head' or 'tail' and run project tools (git, cargo, npm, ...) directly.

Managing context:
- 'shorten_context' replaces the conversation with a summary. Use it only after finishing a distinct
  task or before switching to an unrelated one, never while the user is still building up context.

Project memory:
- 'remember.txt' is your long-term memory for decisions, status and lessons learned. Read it when
  starting a task and update it whenever you decide or learn something.
";

const SKILLS_GUIDE: &str = "
# Skills

Skills are reusable capabilities stored as directories under 'skills/'. Each one holds:
1. 'SKILL.md': frontmatter with 'name' and 'description' (optionally 'version', 'dependencies' and
   'hooks'), followed by Markdown instructions for you.
2. 'scripts/' (optional): helper scripts with descriptive, action-oriented names.

Hooks run scripts automatically on events. Declare them in the frontmatter:
  hooks:
    post_edit: scripts/lint.sh {path}
    startup: scripts/check_deps.sh
Supported events: startup, pre_edit, post_edit (around apply_udiff), pre_run, post_run (around
run_script) and pre_commit (before a commit is proposed). A hook value of 'inject_skill_md' adds the
skill's instructions to the conversation instead of running a script.

Using a skill: when a request matches one, read its 'SKILL.md' and follow it, running its scripts
with 'run_script' (for example 'skills/my-skill/scripts/task.sh').

Creating a skill: add a directory under 'skills/' with a 'SKILL.md' and a 'scripts/' folder. Keep
skills self-contained, split complex logic into focused scripts, and prefer hooks for validation
such as linting or tests. Do not assume tools like 'jq' or 'npm' are installed, and detect the
project's language before running language-specific commands. New skills become available after
the current batch of tool calls.
";

/// Full system prompt: editing rules, the skills guide and the current
/// skill listing.
#[must_use]
pub fn system_prompt(registry: &SkillRegistry) -> String {
    format!(
        "{BASE_INSTRUCTIONS}{SKILLS_GUIDE}{}",
        registry.prompt_fragment()
    )
}

/// System message carrying startup hook output, if any hook produced some.
#[must_use]
pub fn startup_message(report: &HookReport) -> Option<Message> {
    let mut sections: Vec<String> = report.injections();
    let output = report.output();
    if !output.is_empty() {
        sections.insert(0, output);
    }
    if sections.is_empty() {
        return None;
    }
    Some(Message::system(format!(
        "Startup Instructions:\n{}",
        sections.join("\n")
    )))
}

#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            APPLY_UDIFF,
            "Apply a unified diff to a file. Each hunk starts with '@@' and must carry enough \
             context lines (at least 2) to locate the change uniquely. A hunk with only '+' lines \
             is only valid when creating a new file.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path of the file to modify, relative to the project root"
                    },
                    "diff": {
                        "type": "string",
                        "description": "Unified diff with '@@' hunk headers and context lines"
                    }
                },
                "required": ["path", "diff"]
            }),
        ),
        ToolDefinition::new(
            RUN_SCRIPT,
            "Execute a script that belongs to a skill. This is the main way to run commands and \
             interact with the operating system.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Script path. It MUST start with 'skills/' and contain '/scripts/' \
                                        (e.g. 'skills/todo-manager/scripts/scan.sh')."
                    },
                    "args": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Positional arguments passed to the script"
                    }
                },
                "required": ["path"]
            }),
        ),
        ToolDefinition::new(
            SHORTEN_CONTEXT,
            "Summarize the conversation around the current task and replace the history with \
             that summary.",
            json!({
                "type": "object",
                "properties": {
                    "task_description": {
                        "type": "string",
                        "description": "The task currently being worked on"
                    },
                    "future_plans": {
                        "type": "string",
                        "description": "What remains to be done in this session"
                    },
                    "vital_information": {
                        "type": "string",
                        "description": "Facts, constraints or code that must survive verbatim"
                    }
                },
                "required": ["task_description", "future_plans", "vital_information"]
            }),
        ),
    ]
}

/// Summarization prompt over every message after the system prompt.
#[must_use]
pub fn summary_prompt(messages: &[Message], task: &str, plans: &str, vital: &str) -> String {
    let mut history = String::new();
    for message in messages.iter().skip(1) {
        let _ = writeln!(history, "{}: {}", message.role, message.content);
        if message.content.is_empty() {
            if let Some(call) = message.tool_calls.first() {
                let _ = writeln!(history, "{}: [Tool Call: {}]", message.role, call.name());
            }
        }
    }

    let constraints = format!(
        "1. **Current Task**: {task}\n\
         2. **Future Plans**: {plans}\n\
         3. **Vital Information**: {vital}\n\
         \n\
         Ensure the summary is concise but retains all information necessary to continue working \
         on the task and future plans.\n\
         Preserve code snippets or specific data mentioned in \"Vital Information\"."
    );

    format!(
        "Please summarize the provided conversation history, adhering to the following constraints:\n\
         \n\
         {constraints}\n\
         \n\
         Conversation History:\n\
         {history}\n\
         ---\n\
         friendly reminder: Please summarize the conversation history above based on the following constraints:\n\
         {constraints}\n"
    )
}

/// Plain-text transcript for the commit message model, tool calls included.
#[must_use]
pub fn commit_transcript(history: &[Message]) -> String {
    let mut transcript = String::new();
    for message in history {
        let _ = writeln!(transcript, "{}: {}", message.role, message.content);
        for call in &message.tool_calls {
            let _ = writeln!(
                transcript,
                "Tool Call: {} ({})",
                call.name(),
                call.function.arguments
            );
        }
    }
    transcript
}
