//! Agent configuration stored under `<root>/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::age::parse_age;

/// Agent configuration (TOML).
///
/// Edited by humans. Missing fields fall back to defaults, so an empty or
/// absent file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Model (or shortcut) used when neither `-m` nor a persona names one.
    pub default_model: String,

    /// Seconds between SIGTERM and SIGKILL when killing a run.
    pub kill_grace_secs: u64,

    /// Wall-clock bound on a single clone/fetch/worktree git call.
    pub git_timeout_secs: u64,

    /// Default retention age for `clean` (e.g. `7d`, `24h`, `30m`).
    pub clean_older_than: String,

    /// Remote URL for `owner/name`; `{repo}` is replaced by the identifier.
    pub remote_url_template: String,

    pub credentials: CredentialsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Files under `~/.ssh` copied into each isolated home.
    pub ssh_files: Vec<String>,
    /// Environment variables exported from the isolated home's shell profile.
    pub env_vars: Vec<String>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            ssh_files: ["id_rsa", "id_ed25519", "config", "known_hosts"]
                .map(String::from)
                .to_vec(),
            env_vars: ["GH_TOKEN", "GITHUB_TOKEN", "CLAUDE_CODE_OAUTH_TOKEN"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_model: "sonnet".to_string(),
            kill_grace_secs: 2,
            git_timeout_secs: 10 * 60,
            clean_older_than: "7d".to_string(),
            remote_url_template: "git@github.com:{repo}.git".to_string(),
            credentials: CredentialsConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_model.trim().is_empty() {
            return Err(anyhow!("default_model must be non-empty"));
        }
        if self.kill_grace_secs == 0 {
            return Err(anyhow!("kill_grace_secs must be > 0"));
        }
        if self.git_timeout_secs == 0 {
            return Err(anyhow!("git_timeout_secs must be > 0"));
        }
        parse_age(&self.clean_older_than).context("clean_older_than")?;
        if !self.remote_url_template.contains("{repo}") {
            return Err(anyhow!("remote_url_template must contain {{repo}}"));
        }
        Ok(())
    }

    /// Remote URL for an `owner/name` identifier.
    pub fn remote_url(&self, repo: &str) -> String {
        self.remote_url_template.replace("{repo}", repo)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
