//! Orchestration for `agent kill`.
//!
//! The run is marked failed right after SIGTERM, before the grace wait.
//! SIGKILL follows only if the process outlives the grace window.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::core::lifecycle::{KILLED_BY_USER, PROCESS_NOT_FOUND};
use crate::core::types::RunStatus;
use crate::error::RunNotFound;
use crate::io::paths::AgentPaths;
use crate::io::signals::Signals;
use crate::io::store::{FileLock, read_run, write_run};
use crate::status::load_run;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What `kill` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillOutcome {
    /// The run was already terminal; nothing was signalled.
    NotRunning(RunStatus),
    /// The recorded process was already gone; the run is now failed.
    ProcessNotFound { pid: u32 },
    Killed {
        pid: u32,
        /// SIGKILL was needed after the grace window.
        forced: bool,
        /// The process was still alive after SIGKILL.
        survived: bool,
    },
}

/// Terminate run `id`, waiting up to `grace` before escalating to SIGKILL.
#[instrument(skip_all, fields(id = %id))]
pub fn kill_run(
    paths: &AgentPaths,
    id: &str,
    signals: &dyn Signals,
    grace: Duration,
) -> Result<KillOutcome> {
    load_run(paths, id)?;
    let run_paths = paths.run(id);

    let pid = {
        let _lock = FileLock::acquire(&run_paths.lock_path)?;
        let mut run = read_run(&run_paths.meta_path).ok_or_else(|| RunNotFound::new(id))?;
        if run.status.is_terminal() {
            return Ok(KillOutcome::NotRunning(run.status));
        }
        let pid = run.pid;
        if !signals.is_alive(pid) {
            run.finish(RunStatus::Failed, Some(PROCESS_NOT_FOUND.to_string()), Utc::now());
            write_run(&run_paths.meta_path, &run)?;
            info!(pid, "process already gone");
            return Ok(KillOutcome::ProcessNotFound { pid });
        }
        signals.terminate(pid);
        run.finish(RunStatus::Failed, Some(KILLED_BY_USER.to_string()), Utc::now());
        write_run(&run_paths.meta_path, &run)?;
        info!(pid, "sent SIGTERM");
        pid
    };

    if wait_for_exit(signals, pid, grace) {
        return Ok(KillOutcome::Killed {
            pid,
            forced: false,
            survived: false,
        });
    }

    warn!(pid, grace_secs = grace.as_secs(), "process ignored SIGTERM, sending SIGKILL");
    signals.force_kill(pid);
    if wait_for_exit(signals, pid, grace) {
        return Ok(KillOutcome::Killed {
            pid,
            forced: true,
            survived: false,
        });
    }

    warn!(pid, "process still alive after SIGKILL");
    let _lock = FileLock::acquire(&run_paths.lock_path)?;
    if let Some(mut run) = read_run(&run_paths.meta_path) {
        run.error = Some(format!(
            "{KILLED_BY_USER} (process {pid} still alive after SIGKILL)"
        ));
        write_run(&run_paths.meta_path, &run)?;
    }
    Ok(KillOutcome::Killed {
        pid,
        forced: true,
        survived: true,
    })
}

/// Poll until `pid` is gone or `within` elapses. Probes at least once.
fn wait_for_exit(signals: &dyn Signals, pid: u32, within: Duration) -> bool {
    let deadline = Instant::now() + within;
    loop {
        if !signals.is_alive(pid) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}
