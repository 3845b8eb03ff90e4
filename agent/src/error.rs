//! Typed failures that `main` maps to exit codes.
//!
//! Everything else travels as `anyhow::Error` with context attached.

use thiserror::Error;

/// Reasons a run could not be created. No run record survives any of these.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Cloning or refreshing the repository mirror failed.
    #[error("failed to sync {repo}: {message}")]
    Sync { repo: String, message: String },

    /// Checking out the run's worktree failed.
    #[error("failed to create worktree on branch '{branch}': {message}")]
    Worktree { branch: String, message: String },

    #[error("persona not found: {name}")]
    PersonaNotFound { name: String },

    #[error("goal is empty (pass it as arguments or on stdin)")]
    EmptyGoal,
}

impl LaunchError {
    pub fn sync(repo: &str, message: impl Into<String>) -> Self {
        Self::Sync {
            repo: repo.to_string(),
            message: message.into(),
        }
    }

    pub fn worktree(branch: &str, message: impl Into<String>) -> Self {
        Self::Worktree {
            branch: branch.to_string(),
            message: message.into(),
        }
    }
}

/// A command referenced a run id with no readable `run.json`.
#[derive(Debug, Error)]
#[error("run not found: {id}")]
pub struct RunNotFound {
    pub id: String,
}

impl RunNotFound {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}
