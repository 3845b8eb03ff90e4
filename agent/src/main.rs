//! `agent`: launch coding agents as detached runs and track them.
//!
//! Every invocation is short-lived. Runs live under `--root` (default
//! `~/.agents`) and their state is recomputed whenever a command looks at
//! them.

use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

use agent::clean::{CleanAction, CleanOptions, clean_runs};
use agent::core::age::parse_age;
use agent::core::models::MODEL_SHORTCUTS;
use agent::error::{LaunchError, RunNotFound};
use agent::exit_codes;
use agent::inspect::{follow_log, run_logs, run_response, watch_header};
use agent::io::config::{AgentConfig, load_config};
use agent::io::isolation::CredentialSources;
use agent::io::launcher::PtySpawner;
use agent::io::paths::AgentPaths;
use agent::io::personas::list_personas;
use agent::io::signals::OsSignals;
use agent::kill::{KillOutcome, kill_run};
use agent::launch::{LaunchRequest, create_run};
use agent::logging;
use agent::ps::{ps_rows, render_table};
use agent::status::{refresh_all, refresh_run};

#[derive(Parser)]
#[command(
    name = "agent",
    version,
    about = "Launch coding agents as detached, tracked runs"
)]
struct Cli {
    /// Directory holding runs, repo mirrors, personas and config.
    #[arg(long, global = true, env = "AGENTS_ROOT")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Spawn an agent run. The goal comes from arguments, else from stdin.
    Run {
        goal: Vec<String>,
        /// Repository to work in (`owner/name`).
        #[arg(short, long)]
        repo: Option<String>,
        /// Issue number the task addresses.
        #[arg(short, long)]
        issue: Option<u64>,
        /// Model or shortcut (see `agent models`).
        #[arg(short, long)]
        model: Option<String>,
        /// Persona from `<root>/personas/<name>.md`.
        #[arg(long)]
        persona: Option<String>,
        /// Instruct the agent to open a pull request.
        #[arg(long)]
        pr: bool,
        /// Fail the run once it has been running this many minutes.
        #[arg(long, value_name = "MINUTES")]
        timeout: Option<u64>,
    },
    /// List runs.
    Ps,
    /// Follow a run's output.
    Watch { id: String },
    /// Print a run's full output log.
    Logs { id: String },
    /// Print a run's final response.
    Response { id: String },
    /// Kill a running agent.
    Kill { id: String },
    /// Remove old runs.
    Clean {
        /// Remove runs older than this (e.g. 7d, 24h, 30m).
        #[arg(long, value_name = "AGE")]
        older_than: Option<String>,
        /// Remove all runs, including live ones.
        #[arg(long)]
        all: bool,
        /// Also delete run branches from the repo mirrors.
        #[arg(long)]
        branches: bool,
    },
    /// List available personas.
    List,
    /// List model shortcuts.
    Models,
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_code_for(&err));
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.is::<RunNotFound>() {
        exit_codes::NOT_FOUND
    } else {
        exit_codes::INVALID
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let root = match cli.root {
        Some(root) => root,
        None => AgentPaths::default_root()?,
    };
    let paths = AgentPaths::new(root);

    match cli.command {
        Command::Models => {
            cmd_models();
            Ok(())
        }
        Command::List => cmd_list(&paths),
        Command::Ps => cmd_ps(&paths),
        Command::Watch { id } => cmd_watch(&paths, &id),
        Command::Logs { id } => {
            print!("{}", run_logs(&paths, &id)?);
            Ok(())
        }
        Command::Response { id } => {
            println!("{}", run_response(&paths, &id, &OsSignals)?);
            Ok(())
        }
        Command::Kill { id } => {
            let config = load_config(&paths.config_path)?;
            cmd_kill(&paths, &config, &id)
        }
        Command::Clean {
            older_than,
            all,
            branches,
        } => {
            let config = load_config(&paths.config_path)?;
            cmd_clean(&paths, &config, older_than.as_deref(), all, branches)
        }
        Command::Run {
            goal,
            repo,
            issue,
            model,
            persona,
            pr,
            timeout,
        } => {
            let config = load_config(&paths.config_path)?;
            let request = LaunchRequest {
                goal: read_goal(goal)?,
                repo,
                issue,
                model,
                persona,
                pr,
                timeout,
            };
            cmd_run(&paths, &config, &request)
        }
    }
}

/// Goal from arguments, or from stdin when it is piped.
fn read_goal(args: Vec<String>) -> Result<String> {
    if !args.is_empty() {
        return Ok(args.join(" "));
    }
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Err(LaunchError::EmptyGoal.into());
    }
    let mut goal = String::new();
    stdin
        .lock()
        .read_to_string(&mut goal)
        .context("read goal from stdin")?;
    Ok(goal)
}

fn cmd_run(paths: &AgentPaths, config: &AgentConfig, request: &LaunchRequest) -> Result<()> {
    let credentials = CredentialSources::from_env(&config.credentials);
    let run = create_run(paths, config, request, &credentials, &PtySpawner)?;
    if run.pid == 0 {
        eprintln!("warning: agent for run {} failed to start", run.id);
    }
    println!("Run {} started (PID {})", run.id, run.pid);
    if let Some(branch) = &run.branch {
        println!("  Branch: {branch}");
    }
    println!("  Watch: agent watch {}", run.id);
    println!("  Logs:  agent logs {}", run.id);
    Ok(())
}

fn cmd_ps(paths: &AgentPaths) -> Result<()> {
    let runs = refresh_all(paths, &OsSignals)?;
    if runs.is_empty() {
        println!("No runs found.");
        return Ok(());
    }
    print!("{}", render_table(&ps_rows(runs, Utc::now())));
    Ok(())
}

fn cmd_watch(paths: &AgentPaths, id: &str) -> Result<()> {
    let run = refresh_run(paths, id, &OsSignals)?;
    print!("{}", watch_header(&run));
    follow_log(paths, id)
}

fn cmd_kill(paths: &AgentPaths, config: &AgentConfig, id: &str) -> Result<()> {
    let grace = Duration::from_secs(config.kill_grace_secs);
    match kill_run(paths, id, &OsSignals, grace)? {
        KillOutcome::NotRunning(status) => {
            println!("Run {id} is not running (status: {})", status.as_str());
        }
        KillOutcome::ProcessNotFound { pid } => {
            println!("Run {id} process not found (PID {pid})");
        }
        KillOutcome::Killed {
            pid,
            forced,
            survived,
        } => {
            if forced {
                println!("Process {pid} didn't terminate, sent SIGKILL");
            }
            if survived {
                println!("Run {id} marked killed, but process {pid} is still alive");
            } else {
                println!("Run {id} killed");
            }
        }
    }
    Ok(())
}

fn cmd_clean(
    paths: &AgentPaths,
    config: &AgentConfig,
    older_than: Option<&str>,
    all: bool,
    branches: bool,
) -> Result<()> {
    let older_than = parse_age(older_than.unwrap_or(config.clean_older_than.as_str()))?;
    if paths.run_ids()?.is_empty() {
        println!("No runs to clean.");
        return Ok(());
    }
    let options = CleanOptions {
        older_than,
        all,
        branches,
    };
    let report = clean_runs(paths, config, &OsSignals, options, Utc::now())?;
    for (id, action) in &report.actions {
        match action {
            CleanAction::Skipped => println!("Skipping {id}: still running"),
            CleanAction::Kept => {}
            CleanAction::Removed { repo, status } => println!(
                "Cleaned {id} ({}, {})",
                repo.as_deref().unwrap_or("no repo"),
                status.as_str()
            ),
        }
    }
    println!("Cleaned {} run(s)", report.removed());
    Ok(())
}

fn cmd_list(paths: &AgentPaths) -> Result<()> {
    let personas = list_personas(paths)?;
    if personas.is_empty() {
        println!("No personas found in {}", paths.personas_dir.display());
        return Ok(());
    }
    println!("Available personas:\n");
    for persona in personas {
        let model = persona
            .model
            .map(|m| format!(" ({m})"))
            .unwrap_or_default();
        println!("  {:<12} {}{model}", persona.name, persona.description);
    }
    Ok(())
}

fn cmd_models() {
    println!("Model shortcuts:\n");
    for (shortcut, model) in MODEL_SHORTCUTS {
        println!("  {shortcut:<10} {model}");
    }
    println!("\nAny other name is passed through; provider/model ids use opencode.");
}
