//! Identifiers derived for a run: its id and its git branch.

use anyhow::{Result, anyhow};
use rand::Rng;

/// Length of a generated run id.
pub const RUN_ID_LEN: usize = 8;

/// Generate a short lowercase-hex run id.
pub fn generate_run_id<R: Rng>(rng: &mut R) -> String {
    (0..RUN_ID_LEN)
        .map(|_| char::from_digit(rng.gen_range(0..16), 16).unwrap_or('0'))
        .collect()
}

/// Branch name for a run: `issue-<n>-<model>-<id>` or `task-<model>-<id>`.
///
/// The model part is the last `/` segment of the model identifier, cut at
/// its first `-` (`claude-sonnet-4-5` becomes `claude`).
pub fn branch_name(issue: Option<u64>, model: &str, id: &str) -> String {
    let prefix = match issue {
        Some(n) => format!("issue-{n}"),
        None => "task".to_string(),
    };
    format!("{prefix}-{}-{id}", model_short_name(model))
}

fn model_short_name(model: &str) -> &str {
    let last = model.rsplit('/').next().unwrap_or(model);
    last.split('-').next().unwrap_or(last)
}

/// Validate a run id before it is joined onto a filesystem path.
pub fn validate_run_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(anyhow!("run id must not be empty"));
    }
    if id.starts_with('.') {
        return Err(anyhow!("run id must not start with '.' (got '{id}')"));
    }
    if id
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
    {
        return Err(anyhow!("run id must be [A-Za-z0-9_-] only (got '{id}')"));
    }
    Ok(())
}

/// Validate an `owner/name` repository identifier.
pub fn validate_repo(repo: &str) -> Result<()> {
    let Some((owner, name)) = repo.split_once('/') else {
        return Err(anyhow!("repo must be owner/name (got '{repo}')"));
    };
    for part in [owner, name] {
        if part.is_empty()
            || part.starts_with('.')
            || part
                .chars()
                .any(|c| !(c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-'))
        {
            return Err(anyhow!("repo must be owner/name (got '{repo}')"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn branch_with_issue() {
        assert_eq!(
            branch_name(Some(42), "claude-sonnet-4-5", "ab12cd34"),
            "issue-42-claude-ab12cd34"
        );
    }

    #[test]
    fn branch_without_issue() {
        assert_eq!(
            branch_name(None, "claude-sonnet-4-5", "ab12cd34"),
            "task-claude-ab12cd34"
        );
    }

    #[test]
    fn branch_uses_last_model_segment() {
        assert_eq!(
            branch_name(None, "openrouter/deepseek/deepseek-chat-v3.1", "ab12cd34"),
            "task-deepseek-ab12cd34"
        );
        assert_eq!(
            branch_name(Some(7), "opencode/qwen3-coder", "00ff00ff"),
            "issue-7-qwen3-00ff00ff"
        );
    }

    #[test]
    fn generated_ids_are_valid_hex() {
        let mut rng = StdRng::seed_from_u64(7);
        let id = generate_run_id(&mut rng);
        assert_eq!(id.len(), RUN_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        validate_run_id(&id).expect("valid");
    }

    #[test]
    fn rejects_path_like_ids() {
        assert!(validate_run_id("../etc").is_err());
        assert!(validate_run_id(".hidden").is_err());
        assert!(validate_run_id("").is_err());
    }

    #[test]
    fn repo_must_be_owner_slash_name() {
        validate_repo("owner/name").expect("valid");
        assert!(validate_repo("name").is_err());
        assert!(validate_repo("owner/../x").is_err());
        assert!(validate_repo("/name").is_err());
    }
}
