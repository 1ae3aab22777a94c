use clap::Parser;

use crate::controller::{Approval, CommitMode};

/// Coding agent that edits files, runs skill scripts and manages its own context.
#[derive(Debug, Clone, Parser)]
#[command(name = "skill_agent", version, about)]
pub struct Cli {
    /// Ask for confirmation before applying each diff.
    #[arg(long)]
    pub no_auto_accept: bool,

    /// Resume the conversation saved in .agent/history.json.
    #[arg(long = "continue")]
    pub resume: bool,

    /// Propose a git commit after each turn that leaves the tree dirty.
    #[arg(long)]
    pub git_auto_commit: bool,

    /// Commit after each turn without asking. Implies --git-auto-commit.
    #[arg(long)]
    pub git_force_commit: bool,
}

impl Cli {
    #[must_use]
    pub fn approval(&self) -> Approval {
        if self.no_auto_accept {
            Approval::Manual
        } else {
            Approval::Auto
        }
    }

    #[must_use]
    pub fn commit_mode(&self) -> CommitMode {
        if self.git_force_commit {
            CommitMode::Force
        } else if self.git_auto_commit {
            CommitMode::Propose
        } else {
            CommitMode::Off
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Cli;
    use crate::controller::{Approval, CommitMode};

    #[test]
    fn defaults_auto_approve_without_commits() {
        let cli = Cli::parse_from(["skill_agent"]);
        assert_eq!(cli.approval(), Approval::Auto);
        assert_eq!(cli.commit_mode(), CommitMode::Off);
        assert!(!cli.resume);
    }

    #[test]
    fn force_commit_wins_over_auto_commit() {
        let cli = Cli::parse_from([
            "skill_agent",
            "--no-auto-accept",
            "--continue",
            "--git-auto-commit",
            "--git-force-commit",
        ]);
        assert_eq!(cli.approval(), Approval::Manual);
        assert_eq!(cli.commit_mode(), CommitMode::Force);
        assert!(cli.resume);
    }
}
