//! Search-block patch engine for a constrained unified-diff dialect.
//!
//! A diff is a sequence of `@@`-delimited hunks. Each hunk is reduced to a
//! search block (context and deletion lines) and a replace block (context and
//! addition lines). A hunk applies only when its search block occurs exactly
//! once in the working copy; line numbers in hunk headers are never consulted.
//!
//! [`UdiffEngine`] wraps the pure algorithm with the filesystem policy: target
//! paths must stay inside the project root and may never point into the
//! read-only skill tree.

mod apply;
mod error;
mod fuzzy;
mod guard;
mod parse;
mod preview;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub use apply::apply_hunks;
pub use error::{HunkFailure, UdiffError};
pub use fuzzy::{find_best_match, Candidate, FUZZY_THRESHOLD};
pub use parse::{parse_hunks, Hunk};
pub use preview::render_unified;

use guard::PathGuard;

/// Result of computing a patch against the current file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchPreview {
    pub target: PathBuf,
    pub original: String,
    pub updated: String,
}

impl PatchPreview {
    /// Unified diff between the current and prospective content.
    #[must_use]
    pub fn unified(&self, label: &str) -> String {
        render_unified(&self.original, &self.updated, label)
    }

    #[must_use]
    pub fn creates_file(&self) -> bool {
        self.original.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct UdiffEngine {
    guard: PathGuard,
}

impl UdiffEngine {
    /// Creates an engine rooted at `project_root`.
    ///
    /// `read_only` names a tree (the bundled core skills) that may be read by
    /// other components but must never be written through this engine.
    pub fn new(
        project_root: impl AsRef<Path>,
        read_only: Option<&Path>,
    ) -> Result<Self, UdiffError> {
        Ok(Self {
            guard: PathGuard::new(project_root.as_ref(), read_only)?,
        })
    }

    #[must_use]
    pub fn project_root(&self) -> &Path {
        self.guard.root()
    }

    /// Validates the diff against the file without touching disk.
    pub fn dry_run(&self, path: &str, diff: &str) -> Result<PatchPreview, UdiffError> {
        let target = self.guard.resolve(path)?;
        let original = read_normalized(&target)?;
        let hunks = parse_hunks(diff);
        if hunks.is_empty() {
            return Err(UdiffError::NoHunks);
        }

        let updated = apply_hunks(&original, &hunks)?;
        Ok(PatchPreview {
            target,
            original,
            updated,
        })
    }

    /// Recomputes the patch against the current file and writes the result.
    ///
    /// Parent directories are created as needed. The file is only written
    /// once every hunk has applied, so a failure leaves it untouched.
    pub fn apply(&self, path: &str, diff: &str) -> Result<PatchPreview, UdiffError> {
        let preview = self.dry_run(path, diff)?;

        if let Some(parent) = preview.target.parent() {
            fs::create_dir_all(parent).map_err(|source| UdiffError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&preview.target, &preview.updated).map_err(|source| UdiffError::Write {
            path: preview.target.clone(),
            source,
        })?;

        tracing::info!(
            target = %preview.target.display(),
            bytes = preview.updated.len(),
            "patch applied"
        );
        Ok(preview)
    }
}

fn read_normalized(path: &Path) -> Result<String, UdiffError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content.replace("\r\n", "\n")),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(source) => Err(UdiffError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}
