use std::sync::{Arc, Mutex};

use crate::Diagnostic;

/// The memoized outcome of an aspect's `check()`.
///
/// Mirrors the `_check_res` field of the original checker: the first call to `check()` computes
/// the result and every subsequent call returns the same answer without re-running anything.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CheckState {
    /// `check()` has not run yet.
    Unchecked,
    /// `check()` ran and found no errors (there may still be warnings).
    Ok,
    /// `check()` ran and found at least one error.
    Failed,
}

impl CheckState {
    /// Whether this state already holds a memoized result.
    pub fn is_checked(&self) -> bool {
        !matches!(self, CheckState::Unchecked)
    }

    /// The boolean the original checker's `check()` methods return.
    pub fn as_bool(&self) -> bool {
        !matches!(self, CheckState::Failed)
    }
}

#[derive(Debug, Default)]
struct ReporterState {
    errors: usize,
    warnings: usize,
    diagnostics: Vec<Diagnostic>,
}

/// A `Reporter` accumulates the errors and warnings produced while verifying a problem package.
///
/// This is the "object threaded through the component graph" called for in place of the
/// original's process-wide `ProblemAspect.errors` / `ProblemAspect.warnings` class attributes:
/// every component that needs to report a problem holds a clone of the same `Reporter` (cheap,
/// it's an `Arc` handle) scoped to its own aspect name via [`Reporter::for_aspect`].
#[derive(Debug, Clone)]
pub struct Reporter {
    state: Arc<Mutex<ReporterState>>,
    /// The display name of the aspect currently reporting, e.g. "test case group data/secret".
    aspect: Arc<str>,
}

impl Reporter {
    /// Create a new, empty `Reporter` with no aspect name set.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ReporterState::default())),
            aspect: Arc::from(""),
        }
    }

    /// Clone this reporter, rebinding it to report on behalf of a different aspect.
    ///
    /// The counters and diagnostics list are shared with the parent: only the label used in
    /// messages changes.
    pub fn for_aspect(&self, aspect: impl Into<String>) -> Self {
        Self {
            state: Arc::clone(&self.state),
            aspect: Arc::from(aspect.into()),
        }
    }

    /// Report an error against the current aspect. Increments the global error counter.
    pub fn error(&self, msg: impl Into<String>) {
        let msg = msg.into();
        log::error!("in {}: {}", self.aspect, msg);
        let mut state = self.state.lock().unwrap();
        state.errors += 1;
        state
            .diagnostics
            .push(Diagnostic::error(self.aspect.to_string(), msg));
    }

    /// Report an error with an attached note (e.g. a reproduction command).
    pub fn error_with_note(&self, msg: impl Into<String>, note: impl Into<String>) {
        let msg = msg.into();
        let note = note.into();
        log::error!("in {}: {} ({})", self.aspect, msg, note);
        let mut state = self.state.lock().unwrap();
        state.errors += 1;
        state.diagnostics.push(
            Diagnostic::error(self.aspect.to_string(), msg).with_note(note),
        );
    }

    /// Report a warning against the current aspect. Increments the global warning counter.
    pub fn warning(&self, msg: impl Into<String>) {
        let msg = msg.into();
        log::warn!("in {}: {}", self.aspect, msg);
        let mut state = self.state.lock().unwrap();
        state.warnings += 1;
        state
            .diagnostics
            .push(Diagnostic::warning(self.aspect.to_string(), msg));
    }

    /// Informational message, does not affect the counters.
    pub fn info(&self, msg: impl std::fmt::Display) {
        log::info!("{}: {}", self.aspect, msg);
    }

    /// Debug message, does not affect the counters.
    pub fn debug(&self, msg: impl std::fmt::Display) {
        log::debug!("{}: {}", self.aspect, msg);
    }

    /// A message intended to always be shown to the user, regardless of log level.
    pub fn msg(&self, msg: impl std::fmt::Display) {
        println!("{}", msg);
    }

    /// The total number of errors reported so far.
    pub fn errors(&self) -> usize {
        self.state.lock().unwrap().errors
    }

    /// The total number of warnings reported so far.
    pub fn warnings(&self) -> usize {
        self.state.lock().unwrap().warnings
    }

    /// Reset the error/warning counters and the diagnostics list. Used between independent
    /// top-level `check()` runs.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.errors = 0;
        state.warnings = 0;
        state.diagnostics.clear();
    }

    /// All diagnostics reported so far, in emission order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.state.lock().unwrap().diagnostics.clone()
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}
