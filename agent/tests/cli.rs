//! CLI tests for the `agent` binary.
//!
//! Spawns the binary against a scratch root and checks exit codes and the
//! records it leaves behind.

use std::fs;
use std::process::{Command, Output, Stdio};

use agent::core::types::RunStatus;
use agent::exit_codes;
use agent::io::paths::AgentPaths;
use agent::io::store::read_run;
use agent::test_support::{running_run, write_run_fixture};

fn agent(root: &std::path::Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_agent"))
        .arg("--root")
        .arg(root)
        .args(args)
        .stdin(Stdio::null())
        .env_remove("RUST_LOG")
        .output()
        .expect("run agent")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).to_string()
}

#[test]
fn unknown_run_exits_with_not_found() {
    let temp = tempfile::tempdir().expect("tempdir");
    for command in ["logs", "response", "kill", "watch"] {
        let out = agent(temp.path(), &[command, "deadbeef"]);
        assert_eq!(out.status.code(), Some(exit_codes::NOT_FOUND), "{command}");
        assert!(String::from_utf8_lossy(&out.stderr).contains("run not found: deadbeef"));
    }
}

#[test]
fn empty_goal_is_rejected() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = agent(temp.path(), &["run"]);
    assert_eq!(out.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&out.stderr).contains("goal is empty"));
    assert!(AgentPaths::new(temp.path()).run_ids().expect("ids").is_empty());
}

#[test]
fn invalid_age_is_rejected() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = agent(temp.path(), &["clean", "--older-than", "7 days"]);
    assert_eq!(out.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&out.stderr).contains("invalid age"));
}

#[test]
fn ps_on_empty_root() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = agent(temp.path(), &["ps"]);
    assert_eq!(out.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&out), "No runs found.\n");
}

#[test]
fn models_lists_shortcuts() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = agent(temp.path(), &["models"]);
    assert_eq!(out.status.code(), Some(exit_codes::OK));
    assert!(stdout(&out).contains("claude-sonnet-4-5"));
    assert!(stdout(&out).contains("opencode/qwen3-coder"));
}

#[test]
fn response_settles_a_run_that_never_spawned() {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = AgentPaths::new(temp.path());
    let run_paths = write_run_fixture(&paths, &running_run("ab12cd34", 0));
    fs::write(&run_paths.log_path, "plain text output").expect("log");

    let out = agent(temp.path(), &["response", "ab12cd34"]);
    assert_eq!(out.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&out), "plain text output\n");
    let run = read_run(&run_paths.meta_path).expect("run");
    assert_eq!(run.status, RunStatus::Completed);

    let ps = agent(temp.path(), &["ps"]);
    assert!(stdout(&ps).contains("ab12cd34"));
    assert!(stdout(&ps).contains("completed"));
}

#[test]
fn kill_of_vanished_process_marks_failed() {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = AgentPaths::new(temp.path());
    let run_paths = write_run_fixture(&paths, &running_run("ab12cd34", 0));

    let out = agent(temp.path(), &["kill", "ab12cd34"]);
    assert_eq!(out.status.code(), Some(exit_codes::OK));
    assert!(stdout(&out).contains("process not found"));
    let run = read_run(&run_paths.meta_path).expect("run");
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error.as_deref(), Some("Process not found"));
}

#[test]
fn list_reads_personas() {
    let temp = tempfile::tempdir().expect("tempdir");
    let personas = temp.path().join("personas");
    fs::create_dir_all(&personas).expect("mkdir");
    fs::write(
        personas.join("reviewer.md"),
        "---\nname: reviewer\ndescription: Careful reviewer\nmodel: opus\n---\nReview.\n",
    )
    .expect("write");

    let out = agent(temp.path(), &["list"]);
    assert_eq!(out.status.code(), Some(exit_codes::OK));
    assert!(stdout(&out).contains("reviewer"));
    assert!(stdout(&out).contains("Careful reviewer (opus)"));
}
