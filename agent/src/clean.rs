//! Orchestration for `agent clean`: retention of finished runs.

use std::collections::BTreeSet;
use std::fs;

use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, instrument, warn};

use crate::core::types::RunStatus;
use crate::error::RunNotFound;
use crate::io::config::AgentConfig;
use crate::io::git::RepoCache;
use crate::io::paths::AgentPaths;
use crate::io::signals::Signals;
use crate::io::store::FileLock;
use crate::status::refresh_run_at;

#[derive(Debug, Clone, Copy)]
pub struct CleanOptions {
    /// Runs started more recently than this are kept.
    pub older_than: TimeDelta,
    /// Remove every run regardless of age or liveness.
    pub all: bool,
    /// Also delete each removed run's branch from the mirror.
    pub branches: bool,
}

/// Per-run decision of a clean pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanAction {
    /// Process still alive.
    Skipped,
    /// Younger than the cutoff.
    Kept,
    Removed { repo: Option<String>, status: RunStatus },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// `(id, action)` in id order.
    pub actions: Vec<(String, CleanAction)>,
}

impl CleanReport {
    pub fn removed(&self) -> usize {
        self.actions
            .iter()
            .filter(|(_, action)| matches!(action, CleanAction::Removed { .. }))
            .count()
    }
}

/// Remove runs per `options`, consulting the status oracle first.
#[instrument(skip_all, fields(all = options.all, branches = options.branches))]
pub fn clean_runs(
    paths: &AgentPaths,
    config: &AgentConfig,
    signals: &dyn Signals,
    options: CleanOptions,
    now: DateTime<Utc>,
) -> Result<CleanReport> {
    let repos = RepoCache::new(paths, config);
    let mut report = CleanReport::default();
    let mut touched = BTreeSet::new();

    for id in paths.run_ids()? {
        let run = match refresh_run_at(paths, &id, signals, now) {
            Ok(run) => run,
            Err(err) if err.is::<RunNotFound>() => {
                debug!(id = %id, "no run document, leaving directory alone");
                continue;
            }
            Err(err) => return Err(err),
        };

        if !options.all {
            if run.status == RunStatus::Running && signals.is_alive(run.pid) {
                report.actions.push((id, CleanAction::Skipped));
                continue;
            }
            if now.signed_duration_since(run.started_at) < options.older_than {
                report.actions.push((id, CleanAction::Kept));
                continue;
            }
        }

        let run_paths = paths.run(&id);
        // Held while the directory (lock file included) goes away; a status
        // query queued behind it then finds no run.
        let _lock = match FileLock::acquire(&run_paths.lock_path) {
            Ok(lock) => lock,
            Err(err) => {
                debug!(id = %id, err = %format!("{err:#}"), "run vanished before removal");
                continue;
            }
        };
        if let Some(repo) = run.repo.as_deref() {
            if run_paths.repo.exists() {
                repos.remove_worktree(repo, &run_paths.repo);
            }
            if options.branches
                && let Some(branch) = run.branch.as_deref()
            {
                repos.delete_branch(repo, branch);
            }
            touched.insert(repo.to_string());
        }
        match fs::remove_dir_all(&run_paths.dir) {
            Ok(()) => {
                info!(id = %id, status = run.status.as_str(), "run removed");
                report.actions.push((
                    id,
                    CleanAction::Removed {
                        repo: run.repo.clone(),
                        status: run.status,
                    },
                ));
            }
            Err(err) => warn!(id = %id, err = %err, "failed to remove run directory"),
        }
    }

    for repo in &touched {
        repos.prune(repo);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeSignals, at, running_run, write_run_fixture};

    fn options(all: bool) -> CleanOptions {
        CleanOptions {
            older_than: TimeDelta::days(7),
            all,
            branches: false,
        }
    }

    #[test]
    fn live_runs_are_skipped_without_all() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = AgentPaths::new(temp.path());
        let run_paths = write_run_fixture(&paths, &running_run("ab12cd34", 4242));
        let signals = FakeSignals::with_alive(&[4242]);

        let report = clean_runs(
            &paths,
            &AgentConfig::default(),
            &signals,
            options(false),
            at(30 * 86_400),
        )
        .expect("clean");

        assert_eq!(
            report.actions,
            vec![("ab12cd34".to_string(), CleanAction::Skipped)]
        );
        assert!(run_paths.dir.exists());
    }

    #[test]
    fn old_finished_runs_go_and_young_ones_stay() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = AgentPaths::new(temp.path());
        let mut old = running_run("aaaa0000", 11);
        old.finish(RunStatus::Completed, None, at(60));
        write_run_fixture(&paths, &old);
        let mut young = running_run("bbbb0000", 12);
        young.started_at = at(9 * 86_400);
        young.finish(RunStatus::Failed, Some("boom".into()), at(9 * 86_400 + 60));
        let young_paths = write_run_fixture(&paths, &young);

        let report = clean_runs(
            &paths,
            &AgentConfig::default(),
            &FakeSignals::default(),
            options(false),
            at(10 * 86_400),
        )
        .expect("clean");

        assert_eq!(report.removed(), 1);
        assert!(!paths.run("aaaa0000").dir.exists());
        assert!(young_paths.dir.exists());
        assert_eq!(report.actions[1], ("bbbb0000".to_string(), CleanAction::Kept));
    }

    #[test]
    fn all_removes_everything() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = AgentPaths::new(temp.path());
        write_run_fixture(&paths, &running_run("ab12cd34", 4242));
        let signals = FakeSignals::with_alive(&[4242]);

        let report = clean_runs(&paths, &AgentConfig::default(), &signals, options(true), at(5))
            .expect("clean");
        assert_eq!(report.removed(), 1);
        assert!(paths.run_ids().expect("ids").is_empty());
    }

    #[test]
    fn removed_run_stays_gone_for_later_queries() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = AgentPaths::new(temp.path());
        let run_paths = write_run_fixture(&paths, &running_run("ab12cd34", 4242));

        clean_runs(
            &paths,
            &AgentConfig::default(),
            &FakeSignals::with_alive(&[4242]),
            options(true),
            at(5),
        )
        .expect("clean");

        let err = refresh_run_at(&paths, "ab12cd34", &FakeSignals::default(), at(10))
            .expect_err("run removed");
        assert!(err.is::<RunNotFound>());
        assert!(!run_paths.dir.exists());
    }
}
