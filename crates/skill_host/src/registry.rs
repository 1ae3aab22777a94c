use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::SkillLoadError;
use crate::hooks::{HookAction, HookEvent};
use crate::manifest::parse_manifest;
use crate::roots::{SkillRoots, PROJECT_SKILLS_DIR};

const MANIFEST_FILE: &str = "SKILL.md";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillOrigin {
    Core,
    Project,
}

/// A discovered skill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub version: Option<String>,
    pub dependencies: Vec<String>,
    /// Absolute skill directory.
    pub dir: PathBuf,
    pub manifest_path: PathBuf,
    /// Skill directory relative to the root of its tree.
    pub relative_dir: PathBuf,
    pub hooks: BTreeMap<HookEvent, HookAction>,
    /// Files under `scripts/`, relative to `dir`.
    pub scripts: Vec<PathBuf>,
    pub origin: SkillOrigin,
}

impl Skill {
    /// Path the model uses to address a file of this skill through `run_script`.
    #[must_use]
    pub fn virtual_path(&self, relative: &Path) -> String {
        Path::new(PROJECT_SKILLS_DIR)
            .join(&self.relative_dir)
            .join(relative)
            .to_string_lossy()
            .into_owned()
    }

    /// Re-reads the manifest and returns its Markdown body.
    pub fn read_body(&self) -> Result<String, SkillLoadError> {
        let text = fs::read_to_string(&self.manifest_path).map_err(|source| SkillLoadError::Read {
            path: self.manifest_path.clone(),
            source,
        })?;
        parse_manifest(&text)
            .map(|manifest| manifest.body)
            .map_err(|source| SkillLoadError::Manifest {
                path: self.manifest_path.clone(),
                source,
            })
    }
}

/// Loads the skill whose manifest is at `manifest_path` inside `tree_root`.
pub fn load_skill(
    manifest_path: &Path,
    tree_root: &Path,
    origin: SkillOrigin,
) -> Result<Skill, SkillLoadError> {
    let text = fs::read_to_string(manifest_path).map_err(|source| SkillLoadError::Read {
        path: manifest_path.to_path_buf(),
        source,
    })?;
    let manifest = parse_manifest(&text).map_err(|source| SkillLoadError::Manifest {
        path: manifest_path.to_path_buf(),
        source,
    })?;

    let dir = manifest_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| tree_root.to_path_buf());
    let relative_dir = dir
        .strip_prefix(tree_root)
        .map(Path::to_path_buf)
        .unwrap_or_default();

    Ok(Skill {
        name: manifest.name,
        description: manifest.description,
        version: manifest.version,
        dependencies: manifest.dependencies,
        scripts: list_scripts(&dir),
        manifest_path: manifest_path.to_path_buf(),
        relative_dir,
        dir,
        hooks: manifest.hooks,
        origin,
    })
}

fn list_scripts(dir: &Path) -> Vec<PathBuf> {
    let scripts_dir = dir.join("scripts");
    if !scripts_dir.is_dir() {
        return Vec::new();
    }
    let mut scripts: Vec<PathBuf> = WalkDir::new(&scripts_dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.path().strip_prefix(dir).ok().map(Path::to_path_buf))
        .collect();
    scripts.sort();
    scripts
}

/// Finds every `SKILL.md` below `root`. Unreadable or invalid manifests are
/// skipped. A missing root yields no skills.
#[must_use]
pub fn discover(root: &Path, origin: SkillOrigin) -> Vec<Skill> {
    if !root.is_dir() {
        return Vec::new();
    }
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

    let mut skills = Vec::new();
    let manifests = WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == MANIFEST_FILE);
    for entry in manifests {
        match load_skill(entry.path(), &root, origin) {
            Ok(skill) => {
                tracing::debug!(name = %skill.name, path = %entry.path().display(), "loaded skill");
                skills.push(skill);
            }
            Err(error) => {
                tracing::debug!(%error, "skipping skill manifest");
            }
        }
    }
    skills
}

/// Skills keyed by name; project skills shadow core skills.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkillRegistry {
    skills: BTreeMap<String, Skill>,
}

impl SkillRegistry {
    /// Scans the core tree, then the project tree.
    #[must_use]
    pub fn scan(roots: &SkillRoots) -> Self {
        let core = roots
            .core_skills()
            .map(|core| discover(core, SkillOrigin::Core))
            .unwrap_or_default();
        let project = discover(roots.project_skills(), SkillOrigin::Project);
        Self::from_skills(core, project)
    }

    #[must_use]
    pub fn from_skills(core: Vec<Skill>, project: Vec<Skill>) -> Self {
        let skills = core
            .into_iter()
            .chain(project)
            .map(|skill| (skill.name.clone(), skill))
            .collect();
        Self { skills }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Skill> {
        self.skills.get(name)
    }

    /// Skills in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Skill> {
        self.skills.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Skills present here whose names `previous` does not know.
    #[must_use]
    pub fn added_since(&self, previous: &SkillRegistry) -> Vec<&Skill> {
        self.iter()
            .filter(|skill| !previous.skills.contains_key(&skill.name))
            .collect()
    }

    /// Skills declaring a hook for `event`, with that hook.
    pub fn bound_to(&self, event: HookEvent) -> impl Iterator<Item = (&Skill, &HookAction)> {
        self.iter()
            .filter_map(move |skill| skill.hooks.get(&event).map(|action| (skill, action)))
    }

    /// Markdown section describing the skills for the system prompt. Empty
    /// when no skills are known.
    #[must_use]
    pub fn prompt_fragment(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut fragment = String::from(
            "\n# Available Skills\n\
             You can perform complex tasks by using the following skills.\n\
             To use one, read its definition file first.\n\n",
        );
        for skill in self.iter() {
            let _ = write!(fragment, "- **{}**", skill.name);
            if let Some(version) = &skill.version {
                let _ = write!(fragment, " (v{version})");
            }
            let _ = writeln!(fragment, ": {}", skill.description);
            if !skill.dependencies.is_empty() {
                let _ = writeln!(fragment, "  Dependencies: {}", skill.dependencies.join(", "));
            }
            if !skill.scripts.is_empty() {
                fragment.push_str("  Scripts:\n");
                for script in &skill.scripts {
                    let _ = writeln!(fragment, "    - {}", skill.virtual_path(script));
                }
            }
            let _ = writeln!(fragment, "  Definition: {}", skill.manifest_path.display());
        }
        fragment
    }
}
