//! Run lifecycle decisions.
//!
//! Nothing supervises a run once it is launched. Its state is re-derived on
//! every query from three observations, checked in a fixed order: is there a
//! response artifact, has the timeout elapsed, is the process still alive.
//! This module holds the decision; `crate::status` gathers the observations
//! and persists the outcome.

use chrono::{DateTime, TimeDelta, Utc};

use crate::core::output::LogPromotion;
use crate::core::types::{Run, RunStatus, Usage};

pub const TIMEOUT_EXCEEDED: &str = "timeout exceeded";
pub const DIED_WITHOUT_OUTPUT: &str = "process died without output";
pub const KILLED_BY_USER: &str = "Killed by user";
pub const PROCESS_NOT_FOUND: &str = "Process not found";

/// What a status query found for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Already terminal; nothing to recompute.
    Settled,
    StillRunning,
    /// A response artifact exists on disk.
    ResponsePresent,
    /// The configured timeout has elapsed; the process must be terminated.
    TimedOut,
    /// The process is gone; its log decides the outcome.
    ProcessExited,
}

/// Terminal transition to apply to a running run.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Complete {
        /// Text to write as the response artifact, if not already present.
        response: Option<String>,
        usage: Option<Usage>,
        error: Option<String>,
    },
    Fail {
        reason: String,
    },
}

/// Decide what a status query should do, in precedence order.
///
/// `alive` is only consulted once the cheaper file and clock checks have
/// not already decided the outcome.
pub fn judge(
    run: &Run,
    now: DateTime<Utc>,
    response_exists: bool,
    alive: impl FnOnce() -> bool,
) -> Verdict {
    if run.status.is_terminal() {
        return Verdict::Settled;
    }
    if response_exists {
        return Verdict::ResponsePresent;
    }
    if timeout_elapsed(run, now) {
        return Verdict::TimedOut;
    }
    if !alive() {
        return Verdict::ProcessExited;
    }
    Verdict::StillRunning
}

/// True when the run has a timeout and has been running longer than it.
pub fn timeout_elapsed(run: &Run, now: DateTime<Utc>) -> bool {
    match run.timeout {
        Some(minutes) if minutes > 0 => i64::try_from(minutes)
            .ok()
            .and_then(TimeDelta::try_minutes)
            .is_some_and(|budget| now.signed_duration_since(run.started_at) > budget),
        _ => false,
    }
}

/// Map the log of an exited process to its terminal transition.
pub fn settle_exited(promotion: LogPromotion) -> Transition {
    match promotion {
        LogPromotion::Structured(parsed) => Transition::Complete {
            response: Some(parsed.result),
            usage: parsed.usage,
            error: parsed.error,
        },
        LogPromotion::Raw(content) => Transition::Complete {
            response: Some(content),
            usage: None,
            error: None,
        },
        LogPromotion::Empty => Transition::Fail {
            reason: DIED_WITHOUT_OUTPUT.to_string(),
        },
    }
}

/// Apply a terminal transition to the run document.
///
/// Returns false (and leaves the run untouched) if the run was already
/// terminal.
pub fn apply(run: &mut Run, transition: &Transition, now: DateTime<Utc>) -> bool {
    match transition {
        Transition::Complete { usage, error, .. } => {
            if !run.finish(RunStatus::Completed, error.clone(), now) {
                return false;
            }
            if usage.is_some() {
                run.usage = usage.clone();
            }
            true
        }
        Transition::Fail { reason } => run.finish(RunStatus::Failed, Some(reason.clone()), now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::output::{StructuredResult, promote_log};
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0)
            .single()
            .expect("timestamp")
    }

    fn running(timeout: Option<u64>) -> Run {
        let mut run = Run::new("ab12cd34", "claude-sonnet-4-5", at(0));
        run.pid = 4242;
        run.timeout = timeout;
        run
    }

    #[test]
    fn terminal_runs_are_settled_without_probing() {
        let mut run = running(None);
        run.finish(RunStatus::Completed, None, at(10));
        let verdict = judge(&run, at(20), false, || panic!("must not probe"));
        assert_eq!(verdict, Verdict::Settled);
    }

    #[test]
    fn response_wins_over_liveness_and_timeout() {
        let run = running(Some(1));
        let verdict = judge(&run, at(3600), true, || true);
        assert_eq!(verdict, Verdict::ResponsePresent);
    }

    #[test]
    fn timeout_checked_before_liveness() {
        let run = running(Some(30));
        assert_eq!(judge(&run, at(30 * 60), false, || true), Verdict::StillRunning);
        let verdict = judge(&run, at(30 * 60 + 1), false, || panic!("must not probe"));
        assert_eq!(verdict, Verdict::TimedOut);
    }

    #[test]
    fn dead_process_is_exited() {
        let run = running(None);
        assert_eq!(judge(&run, at(5), false, || false), Verdict::ProcessExited);
    }

    #[test]
    fn zero_timeout_means_none() {
        let run = running(Some(0));
        assert!(!timeout_elapsed(&run, at(10_000)));
    }

    #[test]
    fn settle_exited_covers_all_promotions() {
        assert_eq!(
            settle_exited(promote_log("")),
            Transition::Fail {
                reason: DIED_WITHOUT_OUTPUT.to_string()
            }
        );
        assert_eq!(
            settle_exited(promote_log("plain text output")),
            Transition::Complete {
                response: Some("plain text output".to_string()),
                usage: None,
                error: None,
            }
        );
        let structured = settle_exited(LogPromotion::Structured(StructuredResult {
            result: "done".to_string(),
            usage: None,
            error: Some("tool failed".to_string()),
        }));
        let mut run = running(None);
        assert!(apply(&mut run, &structured, at(9)));
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.error.as_deref(), Some("tool failed"));
        assert_eq!(run.completed_at, Some(at(9)));
    }

    #[test]
    fn apply_refuses_second_transition() {
        let mut run = running(None);
        let fail = Transition::Fail {
            reason: TIMEOUT_EXCEEDED.to_string(),
        };
        assert!(apply(&mut run, &fail, at(1)));
        let complete = Transition::Complete {
            response: None,
            usage: None,
            error: None,
        };
        assert!(!apply(&mut run, &complete, at(2)));
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error.as_deref(), Some(TIMEOUT_EXCEEDED));
    }
}
