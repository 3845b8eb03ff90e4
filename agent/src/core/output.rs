//! Promotion of captured agent output into a response artifact.
//!
//! A backend that emits structured output prints a single JSON object with a
//! `result` field (and optionally `usage`, `errors`, `total_cost_usd`). The
//! PTY wrapper may add terminal noise around it, so the whole content is tried
//! first and then the last line that looks like a JSON object.

use serde::Deserialize;
use serde_json::Value;

use crate::core::types::Usage;

/// Fields of interest from a structured backend result.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredResult {
    pub result: String,
    pub usage: Option<Usage>,
    /// Errors reported by the backend, joined into one message.
    pub error: Option<String>,
}

/// What a dead process's log can be promoted to.
#[derive(Debug, Clone, PartialEq)]
pub enum LogPromotion {
    Structured(StructuredResult),
    Raw(String),
    /// Nothing usable: empty, whitespace, or a single stray byte.
    Empty,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    result: String,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    errors: Option<Vec<Value>>,
    #[serde(default)]
    total_cost_usd: Option<f64>,
}

/// Classify log content captured from a process that has exited.
///
/// Line endings are normalized only for classification; raw content is
/// promoted byte for byte.
pub fn promote_log(content: &str) -> LogPromotion {
    let normalized = content.replace("\r\n", "\n");
    if normalized.len() <= 1 || normalized.trim().is_empty() {
        return LogPromotion::Empty;
    }
    match parse_structured(&normalized) {
        Some(parsed) => LogPromotion::Structured(parsed),
        None => LogPromotion::Raw(content.to_string()),
    }
}

/// Parse structured backend output, if the content is one.
pub fn parse_structured(content: &str) -> Option<StructuredResult> {
    let trimmed = content.trim();
    if let Some(parsed) = parse_object(trimmed) {
        return Some(parsed);
    }
    trimmed
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with('{'))
        .and_then(parse_object)
}

fn parse_object(candidate: &str) -> Option<StructuredResult> {
    if !candidate.starts_with('{') {
        return None;
    }
    let raw: RawResult = serde_json::from_str(candidate).ok()?;
    Some(into_structured(raw))
}

fn into_structured(raw: RawResult) -> StructuredResult {
    let mut usage = raw.usage;
    if let Some(cost) = raw.total_cost_usd {
        usage.get_or_insert_with(Usage::default).cost_usd = Some(cost);
    }
    if let Some(usage) = usage.as_mut()
        && usage.total_tokens.is_none()
        && let (Some(input), Some(output)) = (usage.input_tokens, usage.output_tokens)
    {
        usage.total_tokens = Some(input.saturating_add(output));
    }

    let messages: Vec<String> = raw
        .errors
        .iter()
        .flatten()
        .map(|err| match err {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .filter(|s| !s.trim().is_empty())
        .collect();
    let error = if messages.is_empty() {
        None
    } else {
        Some(messages.join("; "))
    };

    StructuredResult {
        result: raw.result,
        usage,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_result_with_usage() {
        let log = r#"{"type":"result","result":"done","usage":{"total_tokens":42}}"#;
        let LogPromotion::Structured(parsed) = promote_log(log) else {
            panic!("expected structured output");
        };
        assert_eq!(parsed.result, "done");
        assert_eq!(parsed.usage.and_then(|u| u.total_tokens), Some(42));
        assert_eq!(parsed.error, None);
    }

    #[test]
    fn plain_text_is_promoted_verbatim() {
        assert_eq!(
            promote_log("plain text output"),
            LogPromotion::Raw("plain text output".to_string())
        );
    }

    #[test]
    fn empty_and_single_byte_logs_are_unusable() {
        assert_eq!(promote_log(""), LogPromotion::Empty);
        assert_eq!(promote_log("\n"), LogPromotion::Empty);
        assert_eq!(promote_log("\r\n  \r\n"), LogPromotion::Empty);
    }

    #[test]
    fn raw_output_keeps_carriage_returns() {
        assert_eq!(
            promote_log("line one\r\nline two\r\n"),
            LogPromotion::Raw("line one\r\nline two\r\n".to_string())
        );
    }

    #[test]
    fn huge_token_counts_saturate() {
        let log = format!(
            r#"{{"result":"ok","usage":{{"input_tokens":{},"output_tokens":5}}}}"#,
            u64::MAX
        );
        let parsed = parse_structured(&log).expect("structured");
        assert_eq!(parsed.usage.and_then(|u| u.total_tokens), Some(u64::MAX));
    }

    #[test]
    fn json_without_result_field_is_raw() {
        let log = r#"{"type":"system","subtype":"init"}"#;
        assert!(matches!(promote_log(log), LogPromotion::Raw(_)));
    }

    #[test]
    fn finds_result_after_terminal_noise() {
        let log = "\u{1b}[?25l\r\nstarting\r\n{\"type\":\"result\",\"result\":\"ok\"}\r\n";
        let LogPromotion::Structured(parsed) = promote_log(log) else {
            panic!("expected structured output");
        };
        assert_eq!(parsed.result, "ok");
    }

    #[test]
    fn merges_cost_errors_and_derives_total() {
        let log = r#"{"result":"partial","total_cost_usd":0.25,"usage":{"input_tokens":10,"output_tokens":5},"errors":["rate limited","retry later"]}"#;
        let parsed = parse_structured(log).expect("structured");
        let usage = parsed.usage.expect("usage");
        assert_eq!(usage.total_tokens, Some(15));
        assert_eq!(usage.cost_usd, Some(0.25));
        assert_eq!(parsed.error.as_deref(), Some("rate limited; retry later"));
    }
}
