//! The status oracle: re-derives a run's lifecycle state on demand.
//!
//! There is no supervisor. Every command that shows a run calls
//! [`refresh_run`], which inspects the run directory and the recorded pid,
//! applies at most one terminal transition, and persists it before
//! returning. Terminal runs are read and returned untouched.

use std::fs;
use std::io::ErrorKind;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::core::lifecycle::{TIMEOUT_EXCEEDED, Transition, Verdict, apply, judge, settle_exited};
use crate::core::naming::validate_run_id;
use crate::core::output::promote_log;
use crate::core::types::Run;
use crate::error::RunNotFound;
use crate::io::paths::{AgentPaths, RunPaths};
use crate::io::signals::Signals;
use crate::io::store::{FileLock, read_run, write_atomic, write_run};

/// Load a run document, failing with [`RunNotFound`] when there is none.
pub fn load_run(paths: &AgentPaths, id: &str) -> Result<Run> {
    validate_run_id(id).map_err(|_| RunNotFound::new(id))?;
    read_run(&paths.run(id).meta_path).ok_or_else(|| RunNotFound::new(id).into())
}

/// Current state of run `id`, persisting any transition it implies.
pub fn refresh_run(paths: &AgentPaths, id: &str, signals: &dyn Signals) -> Result<Run> {
    refresh_run_at(paths, id, signals, Utc::now())
}

/// [`refresh_run`] with an explicit clock.
#[instrument(skip_all, fields(id = %id))]
pub fn refresh_run_at(
    paths: &AgentPaths,
    id: &str,
    signals: &dyn Signals,
    now: DateTime<Utc>,
) -> Result<Run> {
    let run = load_run(paths, id)?;
    if run.status.is_terminal() {
        return Ok(run);
    }

    let run_paths = paths.run(id);
    let _lock = match FileLock::acquire(&run_paths.lock_path) {
        Ok(lock) => lock,
        // Removed by `clean` since it was loaded.
        Err(_) if !run_paths.dir.exists() => return Err(RunNotFound::new(id).into()),
        Err(err) => return Err(err),
    };
    // Another invocation may have settled (or removed) the run while we waited.
    let mut run = read_run(&run_paths.meta_path).ok_or_else(|| RunNotFound::new(id))?;

    let verdict = judge(&run, now, run_paths.response_path.exists(), || {
        signals.is_alive(run.pid)
    });
    debug!(?verdict, pid = run.pid, "status verdict");

    let transition = match verdict {
        Verdict::Settled | Verdict::StillRunning => return Ok(run),
        Verdict::ResponsePresent => Transition::Complete {
            response: None,
            usage: None,
            error: None,
        },
        Verdict::TimedOut => {
            warn!(pid = run.pid, timeout_mins = ?run.timeout, "run exceeded its timeout");
            signals.terminate(run.pid);
            Transition::Fail {
                reason: TIMEOUT_EXCEEDED.to_string(),
            }
        }
        Verdict::ProcessExited => settle_exited(promote_log(&read_log(&run_paths)?)),
    };

    if let Transition::Complete {
        response: Some(text),
        ..
    } = &transition
    {
        write_atomic(&run_paths.response_path, text)?;
    }
    if apply(&mut run, &transition, now) {
        write_run(&run_paths.meta_path, &run)?;
        info!(status = run.status.as_str(), error = ?run.error, "run settled");
    }
    Ok(run)
}

/// Captured output, lossily decoded. A missing log reads as empty.
pub fn read_log(run_paths: &RunPaths) -> Result<String> {
    match fs::read(&run_paths.log_path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(err).with_context(|| format!("read {}", run_paths.log_path.display())),
    }
}

/// Refresh every readable run; unreadable documents are skipped.
pub fn refresh_all(paths: &AgentPaths, signals: &dyn Signals) -> Result<Vec<Run>> {
    let mut runs = Vec::new();
    for id in paths.run_ids()? {
        match refresh_run(paths, &id, signals) {
            Ok(run) => runs.push(run),
            Err(err) if err.is::<RunNotFound>() => debug!(id = %id, "skipping run without document"),
            Err(err) => return Err(err),
        }
    }
    Ok(runs)
}
