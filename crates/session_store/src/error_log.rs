use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use agent_provider::Message;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::SessionStoreError;
use crate::paths::error_log_path;

/// Number of trailing messages recorded with each entry.
pub const ERROR_LOG_TAIL: usize = 2;
pub const RULE: &str = "--------------------------------------------------";

/// Append-only postmortem log for requests the API rejected outright.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(error_log_path(project_root))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends the raw error body and the last [`ERROR_LOG_TAIL`] messages,
    /// one JSON object per line, followed by a rule line.
    pub fn record(&self, body: &str, messages: &[Message]) -> Result<(), SessionStoreError> {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(SessionStoreError::ClockFormat)?;
        let entry = render_entry(&timestamp, body, messages)
            .map_err(|source| SessionStoreError::serialize(&self.path, source))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| {
                SessionStoreError::io("creating error log directory", parent, source)
            })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| SessionStoreError::io("opening error log", &self.path, source))?;
        file.write_all(entry.as_bytes())
            .map_err(|source| SessionStoreError::io("appending error log", &self.path, source))?;

        tracing::info!(path = %self.path.display(), "API error recorded");
        Ok(())
    }
}

fn render_entry(
    timestamp: &str,
    body: &str,
    messages: &[Message],
) -> Result<String, serde_json::Error> {
    let mut entry = format!("Timestamp: {timestamp}\nError: {body}\nLast Messages:\n");
    let start = messages.len().saturating_sub(ERROR_LOG_TAIL);
    for message in &messages[start..] {
        entry.push_str(&serde_json::to_string(message)?);
        entry.push('\n');
    }
    entry.push_str(RULE);
    entry.push('\n');
    Ok(entry)
}
