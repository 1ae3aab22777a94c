use std::path::{Component, Path, PathBuf};

use crate::error::UdiffError;

/// Resolves model-supplied paths and enforces the write boundary.
#[derive(Debug, Clone)]
pub(crate) struct PathGuard {
    root: PathBuf,
    read_only: Option<PathBuf>,
}

impl PathGuard {
    pub(crate) fn new(root: &Path, read_only: Option<&Path>) -> Result<Self, UdiffError> {
        let root = root.canonicalize().map_err(|source| UdiffError::Resolve {
            path: root.to_path_buf(),
            source,
        })?;
        let read_only = read_only.map(anchor).transpose()?;
        Ok(Self { root, read_only })
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the absolute target for `path`, following symlinks in the
    /// existing part of the path so a link cannot smuggle a write outside.
    pub(crate) fn resolve(&self, path: &str) -> Result<PathBuf, UdiffError> {
        let requested = if path.trim().is_empty() { "." } else { path };
        let candidate = Path::new(requested);
        let absolute = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        let resolved = anchor(&absolute)?;

        if let Some(read_only) = &self.read_only {
            if resolved.starts_with(read_only) {
                return Err(UdiffError::ReadOnlyTree {
                    root: read_only.clone(),
                });
            }
        }
        if !resolved.starts_with(&self.root) {
            return Err(UdiffError::OutsideProject {
                path: requested.to_string(),
            });
        }
        Ok(resolved)
    }
}

/// Lexically normalizes `path`, canonicalizes its nearest existing ancestor
/// and re-attaches the components that do not exist yet.
fn anchor(path: &Path) -> Result<PathBuf, UdiffError> {
    let normalized = normalize(path);

    let mut pending = Vec::new();
    let mut cursor = normalized.as_path();
    loop {
        if cursor.exists() {
            let mut anchored = cursor.canonicalize().map_err(|source| UdiffError::Resolve {
                path: cursor.to_path_buf(),
                source,
            })?;
            anchored.extend(pending.iter().rev());
            return Ok(anchored);
        }
        match (cursor.parent(), cursor.file_name()) {
            (Some(parent), Some(name)) => {
                pending.push(name.to_os_string());
                cursor = parent;
            }
            _ => return Ok(normalized),
        }
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{normalize, PathGuard};
    use crate::error::UdiffError;

    #[test]
    fn normalize_folds_parent_components() {
        assert_eq!(
            normalize(Path::new("/work/a/../b/./c.txt")),
            Path::new("/work/b/c.txt")
        );
    }

    #[test]
    fn missing_directories_resolve_under_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let guard = PathGuard::new(dir.path(), None).expect("guard");

        let resolved = guard.resolve("new/deeper/file.rs").expect("resolves");
        assert!(resolved.starts_with(guard.root()));
        assert!(resolved.ends_with("new/deeper/file.rs"));
    }

    #[test]
    fn parent_escape_is_denied() {
        let dir = tempfile::tempdir().expect("tempdir");
        let project = dir.path().join("project");
        std::fs::create_dir(&project).expect("project dir");
        let guard = PathGuard::new(&project, None).expect("guard");

        let error = guard.resolve("../outside.txt").expect_err("escape rejected");
        assert!(matches!(error, UdiffError::OutsideProject { ref path } if path == "../outside.txt"));
    }
}
