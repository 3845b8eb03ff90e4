//! Per-run substitute home directory.
//!
//! The agent runs with `HOME` pointed at `<runDir>/home`, so it sees copies
//! of the user's git/SSH credentials, its own instructions and permission
//! settings, and nothing else from the real home.

use std::env;
use std::fs;
use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;
use shell_escape::escape;
use tracing::{debug, instrument};

use crate::io::config::CredentialsConfig;

/// Tools the agent may use without asking.
pub const ALLOWED_TOOLS: [&str; 6] = ["Edit", "Write", "Bash", "Read", "Glob", "Grep"];

/// Where credentials are copied from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSources {
    /// The invoking user's real home, if known.
    pub real_home: Option<PathBuf>,
    /// File names under `<real_home>/.ssh` to copy.
    pub ssh_files: Vec<String>,
    /// Token variables to export, in order. Only set variables appear here.
    pub tokens: Vec<(String, String)>,
}

impl CredentialSources {
    /// Resolve sources from the invoking process's home and environment.
    pub fn from_env(cfg: &CredentialsConfig) -> Self {
        let tokens = cfg
            .env_vars
            .iter()
            .filter_map(|name| match env::var(name) {
                Ok(value) if !value.is_empty() => Some((name.clone(), value)),
                _ => None,
            })
            .collect();
        Self {
            real_home: dirs::home_dir(),
            ssh_files: cfg.ssh_files.clone(),
            tokens,
        }
    }
}

/// Populate `home` for an agent working in `workdir`.
///
/// `instructions` is written to `<workdir>/AGENTS.md`, and
/// `<home>/.claude/CLAUDE.md` links to it.
#[instrument(skip_all, fields(home = %home.display()))]
pub fn build_isolated_home(
    home: &Path,
    workdir: &Path,
    instructions: &str,
    sources: &CredentialSources,
) -> Result<()> {
    let claude_dir = home.join(".claude");
    fs::create_dir_all(&claude_dir)
        .with_context(|| format!("create {}", claude_dir.display()))?;
    fs::create_dir_all(workdir).with_context(|| format!("create {}", workdir.display()))?;

    let agents_md = workdir.join("AGENTS.md");
    fs::write(&agents_md, instructions)
        .with_context(|| format!("write {}", agents_md.display()))?;
    let claude_md = claude_dir.join("CLAUDE.md");
    symlink(&agents_md, &claude_md)
        .with_context(|| format!("link {} -> {}", claude_md.display(), agents_md.display()))?;

    write_settings(&claude_dir.join("settings.json"))?;
    copy_credentials(home, sources)?;
    write_token_profiles(home, &sources.tokens)?;
    Ok(())
}

fn write_settings(path: &Path) -> Result<()> {
    let settings = json!({
        "permissions": {
            "allow": ALLOWED_TOOLS,
            "deny": [],
            "defaultMode": "bypassPermissions",
        },
        "sandbox": true,
    });
    let mut buf = serde_json::to_string_pretty(&settings).context("serialize settings")?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}

fn copy_credentials(home: &Path, sources: &CredentialSources) -> Result<()> {
    let Some(real_home) = sources.real_home.as_deref() else {
        debug!("no real home; skipping credential copy");
        return Ok(());
    };

    let gitconfig = real_home.join(".gitconfig");
    if gitconfig.is_file() {
        let dest = home.join(".gitconfig");
        fs::copy(&gitconfig, &dest)
            .with_context(|| format!("copy {} to {}", gitconfig.display(), dest.display()))?;
    }

    let ssh_src = real_home.join(".ssh");
    if !ssh_src.is_dir() {
        return Ok(());
    }
    let ssh_dest = home.join(".ssh");
    fs::create_dir_all(&ssh_dest).with_context(|| format!("create {}", ssh_dest.display()))?;
    fs::set_permissions(&ssh_dest, fs::Permissions::from_mode(0o700))
        .with_context(|| format!("chmod {}", ssh_dest.display()))?;
    for name in &sources.ssh_files {
        let src = ssh_src.join(name);
        if !src.is_file() {
            continue;
        }
        let dest = ssh_dest.join(name);
        fs::copy(&src, &dest)
            .with_context(|| format!("copy {} to {}", src.display(), dest.display()))?;
        if is_private_key(name) {
            fs::set_permissions(&dest, fs::Permissions::from_mode(0o600))
                .with_context(|| format!("chmod {}", dest.display()))?;
        }
        debug!(file = %name, "copied ssh file");
    }
    Ok(())
}

fn is_private_key(name: &str) -> bool {
    name.starts_with("id_") && !name.ends_with(".pub")
}

/// `export NAME='value'` lines for the shell profiles; `None` when empty.
pub fn token_exports(tokens: &[(String, String)]) -> Option<String> {
    if tokens.is_empty() {
        return None;
    }
    let mut out = String::new();
    for (name, value) in tokens {
        out.push_str(&format!("export {name}={}\n", escape(value.as_str().into())));
    }
    Some(out)
}

fn write_token_profiles(home: &Path, tokens: &[(String, String)]) -> Result<()> {
    let Some(exports) = token_exports(tokens) else {
        return Ok(());
    };
    for name in [".zshenv", ".profile"] {
        let path = home.join(name);
        fs::write(&path, &exports).with_context(|| format!("write {}", path.display()))?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("chmod {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_real_home(root: &Path) -> PathBuf {
        let real = root.join("real-home");
        fs::create_dir_all(real.join(".ssh")).expect("mkdir");
        fs::write(real.join(".gitconfig"), "[user]\n\tname = Dev\n").expect("write");
        fs::write(real.join(".ssh/id_ed25519"), "PRIVATE").expect("write");
        fs::write(real.join(".ssh/known_hosts"), "github.com ssh-ed25519 AAAA").expect("write");
        real
    }

    #[test]
    fn builds_home_with_links_settings_and_credentials() {
        let temp = tempfile::tempdir().expect("tempdir");
        let home = temp.path().join("run/home");
        let work = temp.path().join("run/work");
        let sources = CredentialSources {
            real_home: Some(fake_real_home(temp.path())),
            ssh_files: vec!["id_rsa".into(), "id_ed25519".into(), "known_hosts".into()],
            tokens: vec![("GH_TOKEN".into(), "ghp_it's".into())],
        };

        build_isolated_home(&home, &work, "# Task\n\ngo\n", &sources).expect("build");

        let link = home.join(".claude/CLAUDE.md");
        assert!(fs::symlink_metadata(&link).expect("meta").file_type().is_symlink());
        assert_eq!(fs::read_to_string(&link).expect("read"), "# Task\n\ngo\n");

        let settings: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(home.join(".claude/settings.json")).expect("read"),
        )
        .expect("json");
        assert_eq!(settings["sandbox"], true);
        assert_eq!(settings["permissions"]["allow"].as_array().map(Vec::len), Some(6));
        assert_eq!(settings["permissions"]["defaultMode"], "bypassPermissions");

        assert!(home.join(".gitconfig").is_file());
        assert!(!home.join(".ssh/id_rsa").exists());
        let key_mode = fs::metadata(home.join(".ssh/id_ed25519"))
            .expect("meta")
            .permissions()
            .mode();
        assert_eq!(key_mode & 0o777, 0o600);
        assert!(home.join(".ssh/known_hosts").is_file());

        let zshenv = fs::read_to_string(home.join(".zshenv")).expect("zshenv");
        assert_eq!(zshenv, "export GH_TOKEN='ghp_it'\\''s'\n");
        assert_eq!(fs::read_to_string(home.join(".profile")).expect("profile"), zshenv);
    }

    #[test]
    fn no_tokens_means_no_profiles() {
        let temp = tempfile::tempdir().expect("tempdir");
        let home = temp.path().join("home");
        let work = temp.path().join("work");
        build_isolated_home(&home, &work, "x\n", &CredentialSources::default()).expect("build");
        assert!(!home.join(".zshenv").exists());
        assert!(!home.join(".profile").exists());
        assert!(!home.join(".ssh").exists());
    }

    #[test]
    fn private_key_detection() {
        assert!(is_private_key("id_rsa"));
        assert!(!is_private_key("id_rsa.pub"));
        assert!(!is_private_key("known_hosts"));
    }
}
