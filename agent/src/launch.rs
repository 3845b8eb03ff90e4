//! Orchestration for `agent run`: create a run and start its agent.
//!
//! Creation order is fixed: allocate the run directory, check out the
//! worktree, build the isolated home, write the initial `running` document,
//! then spawn. The per-run lock is held from the first write until the pid
//! is recorded, so a concurrent status query never sees the pid-0
//! placeholder of a process that is about to start.
//!
//! Any failure before the document is written removes everything created so
//! far; no partial run survives.

use std::fs;
use std::io::ErrorKind;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use crate::core::instructions::{InstructionInputs, render_instructions};
use crate::core::models::resolve_model;
use crate::core::naming::{branch_name, generate_run_id, validate_repo};
use crate::core::types::Run;
use crate::error::LaunchError;
use crate::io::config::AgentConfig;
use crate::io::git::RepoCache;
use crate::io::isolation::{CredentialSources, build_isolated_home};
use crate::io::launcher::{AgentCommand, SpawnRequest, Spawner};
use crate::io::paths::{AgentPaths, RunPaths};
use crate::io::personas::load_persona;
use crate::io::store::{FileLock, read_run, write_run};

const ID_ATTEMPTS: usize = 16;

/// Parameters of `agent run`.
#[derive(Debug, Clone, Default)]
pub struct LaunchRequest {
    pub goal: String,
    pub repo: Option<String>,
    pub issue: Option<u64>,
    /// Model or shortcut; falls back to the persona's, then the configured default.
    pub model: Option<String>,
    pub persona: Option<String>,
    pub pr: bool,
    /// Minutes; zero means no timeout.
    pub timeout: Option<u64>,
}

/// Create a run for `request` and spawn its agent.
///
/// Returns the persisted run. A spawn failure is not an error here: the run
/// is recorded with pid 0 and the next status query fails it.
#[instrument(skip_all, fields(repo = ?request.repo))]
pub fn create_run(
    paths: &AgentPaths,
    config: &AgentConfig,
    request: &LaunchRequest,
    credentials: &CredentialSources,
    spawner: &dyn Spawner,
) -> Result<Run> {
    let goal = request.goal.trim();
    if goal.is_empty() {
        return Err(LaunchError::EmptyGoal.into());
    }
    if let Some(repo) = request.repo.as_deref() {
        validate_repo(repo)?;
    }
    let persona = match request.persona.as_deref() {
        Some(name) => Some(load_persona(paths, name)?.ok_or_else(|| {
            LaunchError::PersonaNotFound {
                name: name.to_string(),
            }
        })?),
        None => None,
    };
    let model_name = request
        .model
        .as_deref()
        .or(persona.as_ref().and_then(|p| p.model.as_deref()))
        .unwrap_or(config.default_model.as_str());
    let resolved = resolve_model(model_name);
    debug!(model = %resolved.model, backend = resolved.backend.as_str(), "model resolved");

    paths.ensure_dirs()?;
    let (id, run_paths) = allocate_run_dir(paths)?;
    let branch = request
        .repo
        .as_ref()
        .map(|_| branch_name(request.issue, &resolved.model, &id));

    let mut run = Run::new(&id, &resolved.model, Utc::now());
    run.repo = request.repo.clone();
    run.issue = request.issue;
    run.persona = persona.as_ref().map(|p| p.name.clone());
    run.branch = branch.clone();
    run.timeout = request.timeout.filter(|mins| *mins > 0);

    let repos = RepoCache::new(paths, config);
    let mut branch_created = false;
    let prepared = (|| -> Result<FileLock> {
        let has_repo = match (request.repo.as_deref(), branch.as_deref()) {
            (Some(repo), Some(branch)) => {
                repos.checkout(repo, branch, &run_paths.repo)?;
                branch_created = true;
                true
            }
            _ => false,
        };
        let workdir = run_paths.workdir(has_repo);
        let instructions = render_instructions(&InstructionInputs {
            goal,
            persona: persona.as_ref().map(|p| p.content.as_str()),
            repo: request.repo.as_deref(),
            branch: branch.as_deref(),
            issue: request.issue,
            pr: request.pr,
        })?;
        build_isolated_home(&run_paths.home, workdir, &instructions, credentials)?;

        let lock = FileLock::acquire(&run_paths.lock_path)?;
        write_run(&run_paths.meta_path, &run)?;
        Ok(lock)
    })();
    let lock = match prepared {
        Ok(lock) => lock,
        Err(err) => {
            error!(id = %id, err = %format!("{err:#}"), "run creation failed, cleaning up");
            discard_run(&repos, &run, &run_paths, branch_created);
            return Err(err);
        }
    };

    let spawn = SpawnRequest {
        command: AgentCommand::for_model(&resolved, goal),
        workdir: run_paths.workdir(run.repo.is_some()).to_path_buf(),
        home: run_paths.home.clone(),
        log_path: run_paths.log_path.clone(),
    };
    let pid = match spawner.spawn(&spawn) {
        Ok(pid) => pid,
        Err(err) => {
            error!(id = %id, err = %format!("{err:#}"), "failed to spawn agent");
            0
        }
    };

    if pid != 0 {
        let mut current =
            read_run(&run_paths.meta_path).ok_or_else(|| anyhow!("run {id} vanished during launch"))?;
        current.pid = pid;
        write_run(&run_paths.meta_path, &current)?;
        run = current;
    }
    drop(lock);

    info!(id = %id, pid, model = %run.model, "run started");
    Ok(run)
}

/// Create a fresh `<root>/runs/<id>/`, retrying on id collisions.
fn allocate_run_dir(paths: &AgentPaths) -> Result<(String, RunPaths)> {
    let mut rng = rand::thread_rng();
    for _ in 0..ID_ATTEMPTS {
        let id = generate_run_id(&mut rng);
        let run_paths = paths.run(&id);
        match fs::create_dir(&run_paths.dir) {
            Ok(()) => return Ok((id, run_paths)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                debug!(id = %id, "run id collision, retrying");
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("create {}", run_paths.dir.display()));
            }
        }
    }
    Err(anyhow!("could not allocate a unique run id"))
}

/// Best-effort removal of a run that never started.
///
/// The branch is only deleted when this run created it; a failed
/// `worktree add -b` means the name belongs to someone else.
fn discard_run(repos: &RepoCache<'_>, run: &Run, run_paths: &RunPaths, branch_created: bool) {
    if let (Some(repo), Some(branch)) = (run.repo.as_deref(), run.branch.as_deref()) {
        if run_paths.repo.exists() {
            repos.remove_worktree(repo, &run_paths.repo);
        }
        repos.prune(repo);
        if branch_created {
            repos.delete_branch(repo, branch);
        }
    }
    if let Err(err) = fs::remove_dir_all(&run_paths.dir) {
        warn!(dir = %run_paths.dir.display(), err = %err, "failed to remove run directory");
    }
}
