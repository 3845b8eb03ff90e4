//! Git adapter: the shared bare mirror per repository and per-run worktrees.
//!
//! Every mutation of a mirror (clone, fetch, worktree registration) happens
//! under the repository's advisory lock so concurrent launches against the
//! same repository serialize instead of corrupting its metadata.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::error::LaunchError;
use crate::io::config::AgentConfig;
use crate::io::paths::AgentPaths;
use crate::io::process::{CommandOutput, OUTPUT_LIMIT_BYTES, run_command_with_timeout};
use crate::io::store::FileLock;

/// Wrapper for executing bounded git commands in a directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
    timeout: Duration,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            workdir: workdir.into(),
            timeout,
        }
    }

    /// Check whether a local branch exists.
    pub fn branch_exists(&self, branch: &str) -> Result<bool> {
        let out = self.run(&[
            "show-ref",
            "--verify",
            "--quiet",
            &format!("refs/heads/{branch}"),
        ])?;
        Ok(out.success())
    }

    /// `main` when the repository has it, otherwise `master`.
    pub fn default_branch(&self) -> Result<String> {
        let name = if self.branch_exists("main")? {
            "main"
        } else {
            "master"
        };
        debug!(branch = name, "default branch");
        Ok(name.to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run(args)?;
        if !output.success() {
            return Err(anyhow!(
                "git {} failed: {}",
                args.join(" "),
                output.failure_message(self.timeout)
            ));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.workdir)
            .env("GIT_TERMINAL_PROMPT", "0");
        run_command_with_timeout(cmd, self.timeout, OUTPUT_LIMIT_BYTES)
    }
}

/// Bare mirrors under `<root>/repos/` and the worktrees checked out of them.
#[derive(Debug, Clone, Copy)]
pub struct RepoCache<'a> {
    paths: &'a AgentPaths,
    config: &'a AgentConfig,
}

impl<'a> RepoCache<'a> {
    pub fn new(paths: &'a AgentPaths, config: &'a AgentConfig) -> Self {
        Self { paths, config }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.git_timeout_secs)
    }

    fn lock(&self, repo: &str) -> Result<FileLock> {
        fs::create_dir_all(&self.paths.repos_dir)
            .with_context(|| format!("create {}", self.paths.repos_dir.display()))?;
        FileLock::acquire(&self.paths.repo_lock(repo))
    }

    fn mirror(&self, repo: &str) -> Git {
        Git::new(self.paths.bare_repo(repo), self.timeout())
    }

    /// Refresh (or create) the mirror, then check out `branch` from its
    /// default branch at `dest`.
    #[instrument(skip_all, fields(repo = %repo, branch = %branch))]
    pub fn checkout(&self, repo: &str, branch: &str, dest: &Path) -> Result<(), LaunchError> {
        let _lock = self
            .lock(repo)
            .map_err(|err| LaunchError::sync(repo, format!("{err:#}")))?;
        self.sync_locked(repo)
            .map_err(|err| LaunchError::sync(repo, format!("{err:#}")))?;
        self.add_worktree_locked(repo, branch, dest)
            .map_err(|err| LaunchError::worktree(branch, format!("{err:#}")))
    }

    /// Ensure the mirror exists and is up to date; returns its path.
    #[instrument(skip_all, fields(repo = %repo))]
    pub fn sync(&self, repo: &str) -> Result<PathBuf, LaunchError> {
        let _lock = self
            .lock(repo)
            .map_err(|err| LaunchError::sync(repo, format!("{err:#}")))?;
        self.sync_locked(repo)
            .map_err(|err| LaunchError::sync(repo, format!("{err:#}")))
    }

    fn sync_locked(&self, repo: &str) -> Result<PathBuf> {
        let bare = self.paths.bare_repo(repo);
        let url = self.config.remote_url(repo);
        if !bare.exists() {
            fs::create_dir_all(&self.paths.repos_dir)
                .with_context(|| format!("create {}", self.paths.repos_dir.display()))?;
            info!(repo, url = %url, "cloning bare mirror");
            let bare_arg = bare.to_string_lossy();
            let result = Git::new(&self.paths.repos_dir, self.timeout())
                .run_checked(&["clone", "--bare", &url, &bare_arg]);
            if let Err(err) = result {
                // A half-written clone would be mistaken for a mirror next time.
                let _ = fs::remove_dir_all(&bare);
                return Err(err);
            }
            return Ok(bare);
        }

        info!(repo, "refreshing bare mirror");
        let git = self.mirror(repo);
        git.run_checked(&["fetch", "--all"])?;
        // Bare clones carry no fetch refspec, so `--all` alone leaves local
        // branches where the clone put them.
        let default = git.default_branch()?;
        let refspec = format!("+refs/heads/{default}:refs/heads/{default}");
        git.run_checked(&["fetch", "origin", &refspec])?;
        Ok(bare)
    }

    fn add_worktree_locked(&self, repo: &str, branch: &str, dest: &Path) -> Result<()> {
        let git = self.mirror(repo);
        let default = git.default_branch()?;
        let dest_arg = dest.to_string_lossy();
        debug!(branch, base = %default, dest = %dest.display(), "adding worktree");
        git.run_checked(&["worktree", "add", "-b", branch, &dest_arg, &default])?;

        let url = self.config.remote_url(repo);
        let worktree = Git::new(dest, self.timeout());
        if let Err(err) = worktree.run_checked(&["remote", "add", "origin", &url]) {
            debug!(err = %err, "origin already configured in worktree");
        }
        Ok(())
    }

    /// Unregister and delete a run's worktree. Failures are logged, not returned.
    pub fn remove_worktree(&self, repo: &str, dest: &Path) {
        if !self.paths.bare_repo(repo).exists() {
            return;
        }
        let dest_arg = dest.to_string_lossy();
        if let Err(err) = self
            .mirror(repo)
            .run_checked(&["worktree", "remove", "--force", &dest_arg])
        {
            warn!(err = %err, dest = %dest.display(), "worktree removal failed");
        }
    }

    /// Delete a run's branch from the mirror. Failures are logged, not returned.
    pub fn delete_branch(&self, repo: &str, branch: &str) {
        if !self.paths.bare_repo(repo).exists() {
            return;
        }
        if let Err(err) = self.mirror(repo).run_checked(&["branch", "-D", branch]) {
            warn!(err = %err, branch, "branch deletion failed");
        }
    }

    /// Drop registrations of worktrees whose directories are gone.
    pub fn prune(&self, repo: &str) {
        if !self.paths.bare_repo(repo).exists() {
            return;
        }
        if let Err(err) = self.mirror(repo).run_checked(&["worktree", "prune"]) {
            warn!(err = %err, repo, "worktree prune failed");
        }
    }
}
