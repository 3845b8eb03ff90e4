//! Test-only fakes and fixtures for agent runs.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Result, anyhow};
use chrono::{DateTime, TimeZone, Utc};

use crate::core::types::Run;
use crate::io::launcher::{SpawnRequest, Spawner};
use crate::io::paths::{AgentPaths, RunPaths};
use crate::io::signals::Signals;
use crate::io::store::write_run;

/// A fixed instant offset by `secs`, for deterministic clocks.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0)
        .single()
        .expect("timestamp")
}

/// A `running` run started at `at(0)`.
pub fn running_run(id: &str, pid: u32) -> Run {
    let mut run = Run::new(id, "claude-sonnet-4-5", at(0));
    run.pid = pid;
    run
}

/// Write `run` under `paths`, creating its directory.
pub fn write_run_fixture(paths: &AgentPaths, run: &Run) -> RunPaths {
    let run_paths = paths.run(&run.id);
    fs::create_dir_all(&run_paths.dir).expect("create run dir");
    write_run(&run_paths.meta_path, run).expect("write run");
    run_paths
}

/// Signal record kept by [`FakeSignals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sent {
    Term(u32),
    Kill(u32),
}

/// In-memory process table.
///
/// By default SIGTERM and SIGKILL both end a process.
#[derive(Debug, Default)]
pub struct FakeSignals {
    alive: RefCell<BTreeSet<u32>>,
    sent: RefCell<Vec<Sent>>,
    probes: Cell<usize>,
    ignore_term: bool,
    ignore_kill: bool,
}

impl FakeSignals {
    pub fn with_alive(pids: &[u32]) -> Self {
        Self {
            alive: RefCell::new(pids.iter().copied().collect()),
            ..Self::default()
        }
    }

    /// Processes survive SIGTERM.
    pub fn ignoring_term(mut self) -> Self {
        self.ignore_term = true;
        self
    }

    /// Processes survive SIGKILL as well.
    pub fn ignoring_kill(mut self) -> Self {
        self.ignore_kill = true;
        self
    }

    pub fn exit(&self, pid: u32) {
        self.alive.borrow_mut().remove(&pid);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.borrow().clone()
    }

    /// Number of liveness probes made so far.
    pub fn probes(&self) -> usize {
        self.probes.get()
    }
}

impl Signals for FakeSignals {
    fn is_alive(&self, pid: u32) -> bool {
        self.probes.set(self.probes.get() + 1);
        pid != 0 && self.alive.borrow().contains(&pid)
    }

    fn terminate(&self, pid: u32) {
        if pid == 0 {
            return;
        }
        self.sent.borrow_mut().push(Sent::Term(pid));
        if !self.ignore_term {
            self.exit(pid);
        }
    }

    fn force_kill(&self, pid: u32) {
        if pid == 0 {
            return;
        }
        self.sent.borrow_mut().push(Sent::Kill(pid));
        if !self.ignore_kill {
            self.exit(pid);
        }
    }
}

/// Records spawn requests instead of starting processes.
#[derive(Debug, Default)]
pub struct FakeSpawner {
    pid: Option<u32>,
    log: Option<String>,
    requests: RefCell<Vec<SpawnRequest>>,
}

impl FakeSpawner {
    /// Every spawn succeeds with `pid`.
    pub fn with_pid(pid: u32) -> Self {
        Self {
            pid: Some(pid),
            ..Self::default()
        }
    }

    /// Every spawn fails.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Write `content` to the run's log on spawn, as if the agent printed it.
    pub fn writing_log(mut self, content: &str) -> Self {
        self.log = Some(content.to_string());
        self
    }

    pub fn requests(&self) -> Vec<SpawnRequest> {
        self.requests.borrow().clone()
    }
}

impl Spawner for FakeSpawner {
    fn spawn(&self, request: &SpawnRequest) -> Result<u32> {
        self.requests.borrow_mut().push(request.clone());
        if let Some(content) = &self.log {
            fs::write(&request.log_path, content)?;
        }
        self.pid.ok_or_else(|| anyhow!("fake spawn failure"))
    }
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args([
            "-c",
            "user.name=Agent Tests",
            "-c",
            "user.email=agent-tests@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .status()
        .expect("spawn git");
    assert!(status.success(), "git {args:?} failed in {}", dir.display());
}

/// Local bare repositories standing in for the network remote.
///
/// `url_template` plugs into `remote_url_template`, so `owner/name` resolves
/// to `<base>/remotes/owner/name.git`.
#[derive(Debug)]
pub struct LocalRemote {
    base: PathBuf,
    pub url_template: String,
}

impl LocalRemote {
    pub fn new(base: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
            url_template: format!("{}/remotes/{{repo}}.git", base.display()),
        }
    }

    fn checkout(&self, repo: &str) -> PathBuf {
        self.base.join("sources").join(repo)
    }

    fn bare(&self, repo: &str) -> PathBuf {
        self.base.join("remotes").join(format!("{repo}.git"))
    }

    /// Create `repo` with one commit on `default_branch`.
    pub fn create(&self, repo: &str, default_branch: &str) {
        let src = self.checkout(repo);
        fs::create_dir_all(&src).expect("create source");
        git(&src, &["init", "-q", "-b", default_branch]);
        fs::write(src.join("README.md"), "# fixture\n").expect("write readme");
        git(&src, &["add", "README.md"]);
        git(&src, &["commit", "-q", "-m", "initial"]);

        let bare = self.bare(repo);
        fs::create_dir_all(bare.parent().expect("bare parent")).expect("create remotes");
        let bare_arg = bare.to_string_lossy().to_string();
        git(&src, &["clone", "-q", "--bare", ".", &bare_arg]);
    }

    /// Commit `file` on the current branch and push it to the remote.
    pub fn push_file(&self, repo: &str, file: &str, contents: &str) {
        let src = self.checkout(repo);
        fs::write(src.join(file), contents).expect("write file");
        git(&src, &["add", file]);
        git(&src, &["commit", "-q", "-m", &format!("add {file}")]);
        let bare_arg = self.bare(repo).to_string_lossy().to_string();
        git(&src, &["push", "-q", &bare_arg, "HEAD"]);
    }
}
