//! Canonical filesystem layout under the agents root (default `~/.agents`).
//!
//! ```text
//! <root>/config.toml
//! <root>/personas/<name>.md
//! <root>/repos/<owner>-<name>.git    bare mirror, shared
//! <root>/repos/<owner>-<name>.lock
//! <root>/runs/<id>/run.json
//!                  output.log
//!                  response.md
//!                  run.lock
//!                  home/
//!                  repo/             worktree (runs with a repo)
//!                  work/             working dir (runs without one)
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

/// Root-level paths. Everything per run hangs off [`AgentPaths::run`].
#[derive(Debug, Clone)]
pub struct AgentPaths {
    pub root: PathBuf,
    pub runs_dir: PathBuf,
    pub repos_dir: PathBuf,
    pub personas_dir: PathBuf,
    pub config_path: PathBuf,
}

/// Paths owned by a single run.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub dir: PathBuf,
    pub meta_path: PathBuf,
    pub log_path: PathBuf,
    pub response_path: PathBuf,
    pub lock_path: PathBuf,
    pub home: PathBuf,
    pub repo: PathBuf,
    pub work: PathBuf,
}

impl RunPaths {
    /// Working directory of the agent: the worktree when a repo is attached.
    pub fn workdir(&self, has_repo: bool) -> &Path {
        if has_repo { &self.repo } else { &self.work }
    }
}

impl AgentPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            runs_dir: root.join("runs"),
            repos_dir: root.join("repos"),
            personas_dir: root.join("personas"),
            config_path: root.join("config.toml"),
            root,
        }
    }

    /// `~/.agents`, the default root.
    pub fn default_root() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".agents"))
            .ok_or_else(|| anyhow!("cannot determine home directory (pass --root)"))
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.runs_dir, &self.repos_dir] {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn run(&self, id: &str) -> RunPaths {
        let dir = self.runs_dir.join(id);
        RunPaths {
            meta_path: dir.join("run.json"),
            log_path: dir.join("output.log"),
            response_path: dir.join("response.md"),
            lock_path: dir.join("run.lock"),
            home: dir.join("home"),
            repo: dir.join("repo"),
            work: dir.join("work"),
            dir,
        }
    }

    /// `owner/name` -> `<root>/repos/owner-name.git`.
    pub fn bare_repo(&self, repo: &str) -> PathBuf {
        self.repos_dir.join(format!("{}.git", repo.replace('/', "-")))
    }

    /// Lock serializing mutations of a repo's bare mirror.
    pub fn repo_lock(&self, repo: &str) -> PathBuf {
        self.repos_dir.join(format!("{}.lock", repo.replace('/', "-")))
    }

    pub fn persona(&self, name: &str) -> PathBuf {
        self.personas_dir.join(format!("{name}.md"))
    }

    /// Ids of all run directories, sorted. Missing runs dir means no runs.
    pub fn run_ids(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.runs_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("read {}", self.runs_dir.display()));
            }
        };
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.context("read runs entry")?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || !entry.path().is_dir() {
                continue;
            }
            ids.push(name);
        }
        ids.sort();
        Ok(ids)
    }
}
