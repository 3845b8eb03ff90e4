//! Durations as users type them (`7d`) and as listings show them (`1h 5m`).

use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use chrono::TimeDelta;
use regex::Regex;

static AGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)([dhm])$").expect("valid age regex"));

/// Parse an age like `7d`, `24h` or `30m`.
pub fn parse_age(age: &str) -> Result<TimeDelta> {
    let caps = AGE_RE
        .captures(age.trim())
        .ok_or_else(|| anyhow!("invalid age format: {age} (use e.g. \"7d\", \"24h\", \"30m\")"))?;
    let value: i64 = caps[1]
        .parse()
        .map_err(|_| anyhow!("invalid age value: {age}"))?;
    let delta = match &caps[2] {
        "d" => TimeDelta::try_days(value),
        "h" => TimeDelta::try_hours(value),
        _ => TimeDelta::try_minutes(value),
    };
    delta.ok_or_else(|| anyhow!("age out of range: {age}"))
}

/// Render elapsed time: `45s`, `12m`, `3h 7m`.
pub fn format_elapsed(elapsed: TimeDelta) -> String {
    let seconds = elapsed.num_seconds().max(0);
    if seconds < 60 {
        return format!("{seconds}s");
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m");
    }
    format!("{}h {}m", minutes / 60, minutes % 60)
}
