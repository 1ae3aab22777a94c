use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use agent_provider::Message;

use crate::error::SessionStoreError;
use crate::paths::history_path;

/// Whole-file JSON array of [`Message`] records.
///
/// Saves go through a sibling temp file and a rename so a crash mid-write
/// never leaves a truncated log behind.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the conventional `<project>/.agent/history.json`.
    #[must_use]
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(history_path(project_root))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Loads the persisted log. A missing file is an empty log; an unreadable
    /// or malformed one is an error.
    pub fn load(&self) -> Result<Vec<Message>, SessionStoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SessionStoreError::io("reading session log", &self.path, source))
            }
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&raw).map_err(|source| SessionStoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    pub fn save(&self, messages: &[Message]) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| {
                SessionStoreError::io("creating session directory", parent, source)
            })?;
        }

        let encoded = serde_json::to_vec_pretty(messages)
            .map_err(|source| SessionStoreError::serialize(&self.path, source))?;
        let staging = self.staging_path();
        fs::write(&staging, encoded)
            .map_err(|source| SessionStoreError::io("writing session log", &staging, source))?;
        fs::rename(&staging, &self.path).map_err(|source| {
            let _ = fs::remove_file(&staging);
            SessionStoreError::io("replacing session log", &self.path, source)
        })?;

        tracing::debug!(
            path = %self.path.display(),
            messages = messages.len(),
            "session log saved"
        );
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        self.path.with_file_name(name)
    }
}
