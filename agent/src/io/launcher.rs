//! Detached agent process spawning.
//!
//! The agent runs under `script` so it gets a pseudo-terminal (backends
//! buffer or change their output when stdout is not a tty). Combined output
//! lands in the run's `output.log`. The launcher returns the pid and never
//! waits for the process.

use std::borrow::Cow;
use std::fs::OpenOptions;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use shell_escape::escape;
use tracing::{info, instrument};

use crate::core::models::{Backend, ResolvedModel};

/// Program and arguments for one agent backend invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl AgentCommand {
    pub fn for_model(resolved: &ResolvedModel, goal: &str) -> Self {
        match resolved.backend {
            Backend::Claude => Self {
                program: "claude".to_string(),
                args: vec![
                    "--model".to_string(),
                    resolved.model.clone(),
                    "--output-format".to_string(),
                    "json".to_string(),
                    "-p".to_string(),
                    goal.to_string(),
                ],
            },
            Backend::OpenCode => Self {
                program: "opencode".to_string(),
                args: vec![
                    "run".to_string(),
                    "--model".to_string(),
                    resolved.model.clone(),
                    format!("Follow AGENTS.md. Task: {goal}"),
                ],
            },
        }
    }

    /// The invocation as one shell-quoted command line.
    pub fn shell_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|part| escape(Cow::Borrowed(part.as_str())).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Everything needed to start an agent for a run.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub command: AgentCommand,
    pub workdir: PathBuf,
    pub home: PathBuf,
    pub log_path: PathBuf,
}

/// Starts agent processes. Returns the pid without waiting.
pub trait Spawner {
    fn spawn(&self, request: &SpawnRequest) -> Result<u32>;
}

/// Spawns the agent under `script` in its own process group.
#[derive(Debug, Clone, Copy, Default)]
pub struct PtySpawner;

/// `script` arguments that run `line` under a pseudo-terminal, discarding
/// the typescript file.
pub fn pty_wrapper_args(line: &str) -> Vec<String> {
    if cfg!(target_os = "macos") {
        ["-q", "/dev/null", "sh", "-c", line]
            .map(String::from)
            .to_vec()
    } else {
        ["-qfec", line, "/dev/null"].map(String::from).to_vec()
    }
}

impl Spawner for PtySpawner {
    #[instrument(skip_all, fields(program = %request.command.program))]
    fn spawn(&self, request: &SpawnRequest) -> Result<u32> {
        let log = open_log(&request.log_path)?;
        let log_err = log
            .try_clone()
            .with_context(|| format!("clone log handle {}", request.log_path.display()))?;

        let line = request.command.shell_line();
        let child = Command::new("script")
            .args(pty_wrapper_args(&line))
            .current_dir(&request.workdir)
            .env("HOME", &request.home)
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(log_err)
            .process_group(0)
            .spawn()
            .with_context(|| format!("spawn {}", request.command.program))?;

        let pid = child.id();
        info!(pid, workdir = %request.workdir.display(), "agent spawned");
        Ok(pid)
    }
}

fn open_log(path: &Path) -> Result<std::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::resolve_model;

    #[test]
    fn claude_invocation_requests_json_output() {
        let cmd = AgentCommand::for_model(&resolve_model("sonnet"), "fix the bug");
        assert_eq!(cmd.program, "claude");
        assert_eq!(
            cmd.args,
            [
                "--model",
                "claude-sonnet-4-5",
                "--output-format",
                "json",
                "-p",
                "fix the bug"
            ]
        );
    }

    #[test]
    fn opencode_invocation_points_at_agents_md() {
        let cmd = AgentCommand::for_model(&resolve_model("qwen3"), "fix it");
        assert_eq!(cmd.program, "opencode");
        assert_eq!(
            cmd.args,
            [
                "run",
                "--model",
                "opencode/qwen3-coder",
                "Follow AGENTS.md. Task: fix it"
            ]
        );
    }

    #[test]
    fn shell_line_quotes_arguments() {
        let cmd = AgentCommand {
            program: "claude".to_string(),
            args: vec!["-p".to_string(), "it's $HOME".to_string()],
        };
        assert_eq!(cmd.shell_line(), "claude -p 'it'\\''s $HOME'");
    }

    #[test]
    fn wrapper_keeps_command_line_as_one_argument() {
        let args = pty_wrapper_args("claude -p 'x y'");
        assert!(args.iter().any(|arg| arg == "claude -p 'x y'"));
        assert!(args.iter().any(|arg| arg == "/dev/null"));
    }
}
