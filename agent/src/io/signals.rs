//! Process liveness probes and termination signals.
//!
//! Launched agents lead their own process group, so signals go to the group
//! first (reaching the PTY wrapper and the agent under it) and fall back to
//! the single pid.

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill, killpg};
use nix::unistd::Pid;
use tracing::{debug, warn};

/// OS process operations used by the lifecycle commands.
///
/// Implementations must treat pid 0 as "no process": it is never alive and
/// is never signalled.
pub trait Signals {
    /// Zero-signal probe.
    fn is_alive(&self, pid: u32) -> bool;
    /// Best-effort SIGTERM.
    fn terminate(&self, pid: u32);
    /// Best-effort SIGKILL.
    fn force_kill(&self, pid: u32);
}

/// Real signals via `kill(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSignals;

fn to_pid(pid: u32) -> Option<Pid> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Some(Pid::from_raw(raw)),
        _ => None,
    }
}

impl OsSignals {
    fn send(&self, pid: u32, signal: Signal) {
        let Some(target) = to_pid(pid) else {
            return;
        };
        match killpg(target, signal) {
            Ok(()) => {
                debug!(pid, ?signal, "signalled process group");
                return;
            }
            Err(err) => debug!(pid, ?signal, err = %err, "group signal failed, trying pid"),
        }
        match kill(target, signal) {
            Ok(()) => debug!(pid, ?signal, "signalled process"),
            Err(Errno::ESRCH) => debug!(pid, "process already gone"),
            Err(err) => warn!(pid, ?signal, err = %err, "failed to signal process"),
        }
    }
}

impl Signals for OsSignals {
    fn is_alive(&self, pid: u32) -> bool {
        let Some(target) = to_pid(pid) else {
            return false;
        };
        match kill(target, None) {
            Ok(()) => true,
            // Exists but belongs to someone else.
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    fn terminate(&self, pid: u32) {
        self.send(pid, Signal::SIGTERM);
    }

    fn force_kill(&self, pid: u32) {
        self.send(pid, Signal::SIGKILL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_zero_is_never_alive() {
        assert!(!OsSignals.is_alive(0));
    }

    #[test]
    fn out_of_range_pid_is_not_alive() {
        assert!(!OsSignals.is_alive(u32::MAX));
    }

    #[test]
    fn own_process_is_alive() {
        assert!(OsSignals.is_alive(std::process::id()));
    }

    #[test]
    fn signalling_pid_zero_is_a_no_op() {
        OsSignals.terminate(0);
        OsSignals.force_kill(0);
    }
}
