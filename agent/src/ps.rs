//! Listing rendering for `agent ps`.

use std::cmp::Reverse;

use chrono::{DateTime, Utc};

use crate::core::age::format_elapsed;
use crate::core::types::{Run, RunStatus};

/// One row of the run listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsRow {
    pub id: String,
    pub repo: String,
    pub issue: String,
    pub model: String,
    pub status: RunStatus,
    pub elapsed: String,
    pub error: Option<String>,
}

impl PsRow {
    pub fn from_run(run: &Run, now: DateTime<Utc>) -> Self {
        let end = run.completed_at.unwrap_or(now);
        let mut elapsed = format_elapsed(end.signed_duration_since(run.started_at));
        if let Some(minutes) = run.timeout.filter(|m| *m > 0) {
            elapsed.push_str(&format!(" / {minutes}m"));
        }
        Self {
            id: run.id.clone(),
            repo: run.repo.clone().unwrap_or_else(|| "(no repo)".to_string()),
            issue: run.issue.map_or_else(|| "-".to_string(), |n| format!("#{n}")),
            model: run.model.rsplit('/').next().unwrap_or(&run.model).to_string(),
            status: run.status,
            elapsed,
            error: run.error.clone(),
        }
    }
}

/// Running runs first, then newest first.
pub fn ps_rows(mut runs: Vec<Run>, now: DateTime<Utc>) -> Vec<PsRow> {
    runs.sort_by_key(|run| (run.status != RunStatus::Running, Reverse(run.started_at)));
    runs.iter().map(|run| PsRow::from_run(run, now)).collect()
}

/// Fixed-width table, with any error on its own line under the row.
pub fn render_table(rows: &[PsRow]) -> String {
    let mut out = format!(
        "{:<10} {:<30} {:<7} {:<12} {:<12} {}\n",
        "ID", "REPO", "ISSUE", "MODEL", "STATUS", "ELAPSED"
    );
    for row in rows {
        out.push_str(&format!(
            "{:<10} {:<30} {:<7} {:<12} {:<12} {}\n",
            row.id,
            row.repo,
            row.issue,
            row.model,
            row.status.as_str(),
            row.elapsed
        ));
        if let Some(error) = &row.error {
            out.push_str(&format!("{:<10} Error: {error}\n", ""));
        }
    }
    out
}
