use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::ScriptError;

/// Directory under the project root holding project skills.
pub const PROJECT_SKILLS_DIR: &str = "skills";

/// The two skill trees and the project root they are resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillRoots {
    project_root: PathBuf,
    project_skills: PathBuf,
    core_skills: Option<PathBuf>,
}

impl SkillRoots {
    pub fn new(project_root: impl AsRef<Path>, core_skills: Option<PathBuf>) -> io::Result<Self> {
        let project_root = project_root.as_ref().canonicalize()?;
        let core_skills = core_skills.map(|core| core.canonicalize().unwrap_or(core));
        Ok(Self {
            project_skills: project_root.join(PROJECT_SKILLS_DIR),
            project_root,
            core_skills,
        })
    }

    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    #[must_use]
    pub fn project_skills(&self) -> &Path {
        &self.project_skills
    }

    #[must_use]
    pub fn core_skills(&self) -> Option<&Path> {
        self.core_skills.as_deref()
    }

    /// Maps a `skills/`-prefixed path onto the core tree when the project has
    /// no such file but the core tree does. Other paths are resolved against
    /// the project root unchanged.
    #[must_use]
    pub fn remap_virtual(&self, path: &str) -> PathBuf {
        let requested = Path::new(path);
        if requested.is_absolute() {
            return requested.to_path_buf();
        }

        let local = self.project_root.join(requested);
        if let (Some(core), Ok(suffix)) = (
            &self.core_skills,
            clean_relative(requested).strip_prefix(PROJECT_SKILLS_DIR),
        ) {
            if !suffix.as_os_str().is_empty() && !local.exists() {
                let candidate = core.join(suffix);
                if candidate.exists() {
                    return candidate;
                }
            }
        }
        local
    }

    /// Applies the script policy: the file must exist inside one of the skill
    /// trees, below a `scripts` directory.
    pub fn resolve_script(&self, path: &str) -> Result<PathBuf, ScriptError> {
        let candidate = self.remap_virtual(path);
        let resolved = match candidate.canonicalize() {
            Ok(resolved) => resolved,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(ScriptError::NotFound {
                    path: path.to_string(),
                });
            }
            Err(source) => {
                return Err(ScriptError::Resolve {
                    path: path.to_string(),
                    source,
                });
            }
        };
        if resolved.is_dir() {
            return Err(ScriptError::NotAFile {
                path: path.to_string(),
            });
        }

        let tree = self
            .trees()
            .find(|tree| resolved.starts_with(tree))
            .ok_or_else(|| ScriptError::OutsideSkillTrees {
                path: path.to_string(),
            })?;

        let inside_scripts = resolved
            .strip_prefix(&tree)
            .ok()
            .and_then(Path::parent)
            .is_some_and(|dir| dir.components().any(|part| part.as_os_str() == "scripts"));
        if !inside_scripts {
            return Err(ScriptError::NotInScriptsDir {
                path: path.to_string(),
            });
        }
        Ok(resolved)
    }

    fn trees(&self) -> impl Iterator<Item = PathBuf> + '_ {
        let project = self
            .project_skills
            .canonicalize()
            .unwrap_or_else(|_| self.project_skills.clone());
        std::iter::once(project).chain(self.core_skills.iter().cloned())
    }
}

fn clean_relative(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::SkillRoots;
    use crate::error::ScriptError;

    fn fixture() -> (tempfile::TempDir, SkillRoots) {
        let dir = tempfile::tempdir().expect("tempdir");
        let project = dir.path().join("project");
        let core = dir.path().join("core");
        fs::create_dir_all(project.join("skills/local/scripts")).expect("project skill");
        fs::create_dir_all(core.join("bundled/scripts")).expect("core skill");
        fs::write(project.join("skills/local/scripts/run.sh"), "echo local").expect("script");
        fs::write(project.join("skills/local/helper.sh"), "echo helper").expect("helper");
        fs::write(core.join("bundled/scripts/go.sh"), "echo core").expect("core script");
        fs::write(project.join("notes.sh"), "echo stray").expect("stray");
        let roots = SkillRoots::new(&project, Some(core)).expect("roots");
        (dir, roots)
    }

    #[test]
    fn virtual_prefix_falls_back_to_core_tree() {
        let (_dir, roots) = fixture();

        let resolved = roots
            .resolve_script("skills/bundled/scripts/go.sh")
            .expect("core script resolves");
        assert!(resolved.ends_with("core/bundled/scripts/go.sh"));
    }

    #[test]
    fn project_file_wins_over_core_remap() {
        let (_dir, roots) = fixture();

        let resolved = roots
            .resolve_script("./skills/local/scripts/run.sh")
            .expect("project script resolves");
        assert!(resolved.ends_with("project/skills/local/scripts/run.sh"));
    }

    #[test]
    fn policy_rejections_are_specific() {
        let (_dir, roots) = fixture();

        assert!(matches!(
            roots.resolve_script("skills/local/helper.sh"),
            Err(ScriptError::NotInScriptsDir { .. })
        ));
        assert!(matches!(
            roots.resolve_script("notes.sh"),
            Err(ScriptError::OutsideSkillTrees { .. })
        ));
        assert!(matches!(
            roots.resolve_script("skills/missing/scripts/x.sh"),
            Err(ScriptError::NotFound { .. })
        ));
        assert!(matches!(
            roots.resolve_script("skills/local/scripts"),
            Err(ScriptError::NotAFile { .. })
        ));
    }
}
