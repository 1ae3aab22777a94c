use std::path::{Path, PathBuf};

pub const STATE_DIR: &str = ".agent";
pub const HISTORY_FILE: &str = "history.json";
pub const ERROR_LOG_FILE: &str = "errors.log";

#[must_use]
pub fn state_root(project_root: &Path) -> PathBuf {
    project_root.join(STATE_DIR)
}

#[must_use]
pub fn history_path(project_root: &Path) -> PathBuf {
    state_root(project_root).join(HISTORY_FILE)
}

#[must_use]
pub fn error_log_path(project_root: &Path) -> PathBuf {
    state_root(project_root).join(ERROR_LOG_FILE)
}
