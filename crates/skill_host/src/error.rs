use std::io;
use std::path::PathBuf;

/// A `SKILL.md` that does not follow the manifest grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest has no frontmatter block")]
    MissingFrontmatter,
    #[error("frontmatter block is not closed with '---'")]
    UnterminatedFrontmatter,
    #[error("no name found in frontmatter")]
    MissingName,
    #[error("hook '{event}' has an invalid command: {reason}")]
    InvalidHook { event: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SkillLoadError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        source: ManifestError,
    },
}

/// Failure to validate or run a skill script.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("script not found: {path}")]
    NotFound { path: String },
    #[error("path is a directory, not a file: {path}")]
    NotAFile { path: String },
    #[error("script must be inside a 'skills' directory (Local or Core): {path}")]
    OutsideSkillTrees { path: String },
    #[error("script must be inside a 'scripts' folder: {path}")]
    NotInScriptsDir { path: String },
    #[error("failed to resolve script path {path}: {source}")]
    Resolve { path: String, source: io::Error },
    #[error("failed to launch {program}: {source}")]
    Launch { program: String, source: io::Error },
    #[error("failed waiting for script: {source}")]
    Wait { source: io::Error },
    #[error("interrupted by user")]
    Cancelled,
    #[error("script execution failed: {status}\nOutput:\n{output}")]
    Failed { status: String, output: String },
}

impl ScriptError {
    /// True for path-policy rejections, where nothing was executed.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::NotAFile { .. }
                | Self::OutsideSkillTrees { .. }
                | Self::NotInScriptsDir { .. }
                | Self::Resolve { .. }
        )
    }

    /// Error text for the model, with a reminder of the script policy and the
    /// available skills appended to validation failures.
    #[must_use]
    pub fn with_guidance(&self, skills_prompt: &str) -> String {
        if !self.is_validation() {
            return self.to_string();
        }
        format!(
            "{self}\n\nREMINDER: run_script can only execute scripts inside a 'scripts' folder of a skill, \
             either in the project 'skills' directory or in the core skills.\n{skills_prompt}"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::ScriptError;

    #[test]
    fn validation_errors_carry_the_reminder() {
        let error = ScriptError::NotInScriptsDir {
            path: "skills/demo/run.sh".to_string(),
        };
        let message = error.with_guidance("\n# Available Skills\n");

        assert!(message.starts_with("script must be inside a 'scripts' folder"));
        assert!(message.contains("REMINDER: run_script"));
        assert!(message.ends_with("# Available Skills\n"));
    }

    #[test]
    fn execution_failures_are_reported_verbatim() {
        let error = ScriptError::Failed {
            status: "exit status: 2".to_string(),
            output: "boom".to_string(),
        };

        assert_eq!(
            error.with_guidance("ignored"),
            "script execution failed: exit status: 2\nOutput:\nboom"
        );
    }
}
