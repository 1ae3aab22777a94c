use std::collections::BTreeMap;

use crate::error::ManifestError;
use crate::hooks::{HookAction, HookEvent};

/// Hook template that injects the manifest body instead of running a script.
pub const INJECT_MANIFEST_BODY: &str = "inject_skill_md";

const FENCE: &str = "---";

/// Typed contents of a `SKILL.md`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub name: String,
    pub description: String,
    pub version: Option<String>,
    pub dependencies: Vec<String>,
    pub hooks: BTreeMap<HookEvent, HookAction>,
    /// Markdown after the frontmatter, trimmed.
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Scalars,
    Hooks,
    Dependencies,
}

/// Parses a manifest.
///
/// The frontmatter must open on the first line and close with a `---` line.
/// Inside it, unindented `key: value` lines set scalars, `hooks:` opens a map
/// of indented `event: command` lines and `dependencies:` opens a list of
/// indented `- item` lines. A section ends at the next unindented line.
/// Unknown keys and unknown hook events are ignored.
pub fn parse_manifest(text: &str) -> Result<Manifest, ManifestError> {
    let mut lines = text.lines().map(|line| line.strip_suffix('\r').unwrap_or(line));
    if lines.next().map(str::trim_end) != Some(FENCE) {
        return Err(ManifestError::MissingFrontmatter);
    }

    let mut manifest = Manifest::default();
    let mut section = Section::Scalars;
    let mut closed = false;

    for line in lines.by_ref() {
        if line.trim_end() == FENCE {
            closed = true;
            break;
        }
        let trimmed = line.trim();
        let indented = line.starts_with(' ') || line.starts_with('\t');

        match trimmed {
            "hooks:" => {
                section = Section::Hooks;
                continue;
            }
            "dependencies:" => {
                section = Section::Dependencies;
                continue;
            }
            _ => {}
        }

        if section != Section::Scalars {
            if indented {
                match section {
                    Section::Hooks => parse_hook_line(trimmed, &mut manifest)?,
                    Section::Dependencies => parse_dependency_line(trimmed, &mut manifest),
                    Section::Scalars => {}
                }
                continue;
            }
            if trimmed.is_empty() {
                continue;
            }
            section = Section::Scalars;
        }

        parse_scalar_line(line, &mut manifest);
    }

    if !closed {
        return Err(ManifestError::UnterminatedFrontmatter);
    }
    if manifest.name.is_empty() {
        return Err(ManifestError::MissingName);
    }

    manifest.body = lines.collect::<Vec<_>>().join("\n").trim().to_string();
    Ok(manifest)
}

fn parse_scalar_line(line: &str, manifest: &mut Manifest) {
    let Some((key, value)) = line.split_once(':') else {
        return;
    };
    let value = unquote(value.trim()).to_string();
    match key {
        "name" => manifest.name = value,
        "description" => manifest.description = value,
        "version" if !value.is_empty() => manifest.version = Some(value),
        _ => {}
    }
}

fn parse_hook_line(trimmed: &str, manifest: &mut Manifest) -> Result<(), ManifestError> {
    let Some((key, template)) = trimmed.split_once(':') else {
        return Ok(());
    };
    let key = key.trim();
    let Ok(event) = key.parse::<HookEvent>() else {
        tracing::debug!(event = key, "ignoring unsupported hook event");
        return Ok(());
    };

    let action = HookAction::parse(template.trim()).map_err(|reason| ManifestError::InvalidHook {
        event: key.to_string(),
        reason,
    })?;
    manifest.hooks.insert(event, action);
    Ok(())
}

fn parse_dependency_line(trimmed: &str, manifest: &mut Manifest) {
    let item = trimmed.strip_prefix('-').unwrap_or(trimmed).trim();
    if !item.is_empty() {
        manifest.dependencies.push(unquote(item).to_string());
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
