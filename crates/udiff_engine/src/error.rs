use std::io;
use std::path::PathBuf;

use crate::fuzzy::Candidate;

/// Why a single hunk could not be applied. `hunk` is 1-based.
#[derive(Debug, Clone, PartialEq)]
pub enum HunkFailure {
    /// Empty search block against a non-empty file.
    PureInsertion { hunk: usize },
    Ambiguous { hunk: usize, matches: usize },
    NotFound {
        hunk: usize,
        search_block: String,
        candidate: Option<Candidate>,
    },
}

impl HunkFailure {
    #[must_use]
    pub fn hunk(&self) -> usize {
        match self {
            Self::PureInsertion { hunk }
            | Self::Ambiguous { hunk, .. }
            | Self::NotFound { hunk, .. } => *hunk,
        }
    }
}

impl std::fmt::Display for HunkFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "hunk {} failed to apply: ", self.hunk())?;
        match self {
            Self::PureInsertion { .. } => write!(
                f,
                "pure insertion (no context lines) is not allowed in existing file.\n\
                 Please provide at least 2 lines of context (' ') around the new code to uniquely locate the insertion point."
            ),
            Self::Ambiguous { matches, .. } => write!(
                f,
                "ambiguous context. The search block matches {matches} times in the file.\n\
                 Please provide more context lines to uniquely identify the code to replace."
            ),
            Self::NotFound {
                candidate: Some(candidate),
                ..
            } => write!(
                f,
                "context not found.\nProbable match found at lines {}-{} (score {:.2}):\n```\n{}\n```\n\
                 Please verify the context lines and try again.",
                candidate.start_line, candidate.end_line, candidate.score, candidate.snippet
            ),
            Self::NotFound {
                search_block,
                candidate: None,
                ..
            } => write!(f, "context not found.\nSearch Block:\n{search_block}"),
        }
    }
}

impl std::error::Error for HunkFailure {}

#[derive(Debug, thiserror::Error)]
pub enum UdiffError {
    #[error("no valid hunks found in diff")]
    NoHunks,
    #[error(transparent)]
    Hunk(#[from] HunkFailure),
    #[error("access denied: path '{path}' is outside the current working directory")]
    OutsideProject { path: String },
    #[error("access denied: cannot modify core skills in '{}'", root.display())]
    ReadOnlyTree { root: PathBuf },
    #[error("failed to resolve path {}: {source}", path.display())]
    Resolve { path: PathBuf, source: io::Error },
    #[error("failed to read file {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to write file {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}
