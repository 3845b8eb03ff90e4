//! Read-only views of a run: `logs`, `response`, `watch`.

use std::fs;
use std::io::ErrorKind;
use std::process::Command;

use anyhow::{Context, Result, anyhow, bail};

use crate::core::types::Run;
use crate::io::paths::AgentPaths;
use crate::io::signals::Signals;
use crate::status::{load_run, read_log, refresh_run};

/// Full captured output of run `id`.
pub fn run_logs(paths: &AgentPaths, id: &str) -> Result<String> {
    load_run(paths, id)?;
    read_log(&paths.run(id))
}

/// Final response of run `id`, refreshing its status first.
pub fn run_response(paths: &AgentPaths, id: &str, signals: &dyn Signals) -> Result<String> {
    let run = refresh_run(paths, id, signals)?;
    let path = paths.run(id).response_path;
    match fs::read_to_string(&path) {
        Ok(text) => Ok(text),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(anyhow!(
            "no response yet for run {id} (status: {})",
            run.status.as_str()
        )),
        Err(err) => Err(err).with_context(|| format!("read {}", path.display())),
    }
}

/// Header printed by `watch` before following the log.
pub fn watch_header(run: &Run) -> String {
    let dash = || "-".to_string();
    format!(
        "Watching run {} ({})...\nRepo: {}\nModel: {}\nBranch: {}\n---\n",
        run.id,
        run.status.as_str(),
        run.repo.clone().unwrap_or_else(dash),
        run.model,
        run.branch.clone().unwrap_or_else(dash),
    )
}

/// Follow the run's log with `tail -f` until interrupted.
pub fn follow_log(paths: &AgentPaths, id: &str) -> Result<()> {
    let log_path = paths.run(id).log_path;
    if !log_path.exists() {
        bail!("log file not found for run {id}");
    }
    let status = Command::new("tail")
        .arg("-f")
        .arg(&log_path)
        .status()
        .context("spawn tail")?;
    if !status.success() && status.code().is_some() {
        bail!("tail exited with {status}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeSignals, running_run, write_run_fixture};

    #[test]
    fn response_settles_a_finished_process() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = AgentPaths::new(temp.path());
        let run_paths = write_run_fixture(&paths, &running_run("ab12cd34", 4242));
        fs::write(&run_paths.log_path, "plain text output").expect("log");

        let text = run_response(&paths, "ab12cd34", &FakeSignals::default()).expect("response");
        assert_eq!(text, "plain text output");
        assert_eq!(run_logs(&paths, "ab12cd34").expect("logs"), "plain text output");
    }

    #[test]
    fn response_of_live_run_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = AgentPaths::new(temp.path());
        write_run_fixture(&paths, &running_run("ab12cd34", 4242));

        let err = run_response(&paths, "ab12cd34", &FakeSignals::with_alive(&[4242]))
            .expect_err("no response");
        assert!(err.to_string().contains("status: running"));
    }

    #[test]
    fn header_names_the_run() {
        let header = watch_header(&running_run("ab12cd34", 1));
        assert!(header.starts_with("Watching run ab12cd34 (running)..."));
        assert!(header.contains("Repo: -\n"));
        assert!(header.ends_with("---\n"));
    }
}
