//! Decoding of POSIX child-process termination status into domain verdicts.
//!
//! This is the only place in the workspace that looks at raw exit/signal numbers; every other
//! component asks a [`TerminationStatus`] `is_tle`/`is_rte` instead of inspecting codes itself.

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use nix::sys::signal::Signal;

/// How a child process ended.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TerminationStatus {
    /// The process called `exit()` (or returned from `main`) with this code.
    Exited(i32),
    /// The process was killed by this signal.
    Signalled(i32),
}

impl TerminationStatus {
    /// Build a `TerminationStatus` from the status a `std::process::Child::wait` produced.
    pub fn from_exit_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            TerminationStatus::Exited(code)
        } else if let Some(signal) = status.signal() {
            TerminationStatus::Signalled(signal)
        } else {
            // Can only happen for a status that is neither exited nor signalled, which POSIX
            // does not produce; fall back to a RTE-shaped exit code rather than panicking.
            TerminationStatus::Exited(-1)
        }
    }

    /// True iff the process was terminated by signal and that signal is the CPU time limit
    /// (`SIGXCPU`), or, when `may_signal_with_usr1` is set, `SIGUSR1` — some sandboxes report a
    /// time-limit kill that way instead.
    pub fn is_tle(&self, may_signal_with_usr1: bool) -> bool {
        match self {
            TerminationStatus::Signalled(sig) => {
                *sig == Signal::SIGXCPU as i32
                    || (may_signal_with_usr1 && *sig == Signal::SIGUSR1 as i32)
            }
            TerminationStatus::Exited(_) => false,
        }
    }

    /// True iff the process did not exit normally, or exited with a nonzero code.
    pub fn is_rte(&self) -> bool {
        match self {
            TerminationStatus::Exited(code) => *code != 0,
            TerminationStatus::Signalled(_) => true,
        }
    }

    /// The raw exit code, if the process exited normally (as opposed to being signalled).
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            TerminationStatus::Exited(code) => Some(*code),
            TerminationStatus::Signalled(_) => None,
        }
    }

    /// Decode a raw POSIX `wait()`-style status word, as reported by an external process (e.g.
    /// the interactive runner's `val_status`/`sub_status` wire tokens) rather than obtained
    /// directly from `std::process::Child::wait`. Follows the same low-byte-is-signal encoding
    /// as the `WIFSIGNALED`/`WTERMSIG`/`WEXITSTATUS` macros.
    pub fn from_raw_wait_status(raw: i32) -> Self {
        let termsig = raw & 0x7f;
        if termsig == 0 {
            TerminationStatus::Exited((raw >> 8) & 0xff)
        } else {
            TerminationStatus::Signalled(termsig)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_zero_is_not_rte() {
        assert!(!TerminationStatus::Exited(0).is_rte());
    }

    #[test]
    fn nonzero_exit_is_rte() {
        assert!(TerminationStatus::Exited(1).is_rte());
    }

    #[test]
    fn sigxcpu_is_tle() {
        let status = TerminationStatus::Signalled(Signal::SIGXCPU as i32);
        assert!(status.is_tle(false));
        assert!(status.is_tle(true));
        assert!(status.is_rte());
    }

    #[test]
    fn sigusr1_is_tle_only_when_allowed() {
        let status = TerminationStatus::Signalled(Signal::SIGUSR1 as i32);
        assert!(!status.is_tle(false));
        assert!(status.is_tle(true));
    }

    #[test]
    fn sigsegv_is_rte_not_tle() {
        let status = TerminationStatus::Signalled(Signal::SIGSEGV as i32);
        assert!(status.is_rte());
        assert!(!status.is_tle(true));
    }

    #[test]
    fn raw_wait_status_decodes_clean_exit() {
        let status = TerminationStatus::from_raw_wait_status(0);
        assert_eq!(status, TerminationStatus::Exited(0));
    }

    #[test]
    fn raw_wait_status_decodes_nonzero_exit() {
        let status = TerminationStatus::from_raw_wait_status(42 << 8);
        assert_eq!(status, TerminationStatus::Exited(42));
    }

    #[test]
    fn raw_wait_status_decodes_signal() {
        let status = TerminationStatus::from_raw_wait_status(Signal::SIGUSR1 as i32);
        assert_eq!(status, TerminationStatus::Signalled(Signal::SIGUSR1 as i32));
        assert!(status.is_tle(true));
    }
}
