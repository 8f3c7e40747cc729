//! This crate contains the code for producing human-friendly and machine-friendly diagnostic
//! messages, plus the [`Reporter`] that every aspect of a problem package threads through the
//! verification pipeline to accumulate errors and warnings.

#![deny(missing_docs)]

mod reporter;

use std::fmt::{Display, Formatter};

use colored::{Color, Colorize};
use serde::{Deserialize, Serialize};

pub use reporter::{CheckState, Reporter};

/// The level of the message.
///
/// This influences the color of the output, and the order in which the diagnostics are shown.
#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    /// The message is just a warning.
    Warning,
    /// The message is an error.
    Error,
}

impl DiagnosticLevel {
    /// Return a human-friendly version of this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticLevel::Error => "Error",
            DiagnosticLevel::Warning => "Warning",
        }
    }

    /// The color in which this message should be printed.
    pub fn color(&self) -> Color {
        match self {
            DiagnosticLevel::Warning => Color::BrightYellow,
            DiagnosticLevel::Error => Color::BrightRed,
        }
    }
}

impl Display for DiagnosticLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A [`Diagnostic`] is a message, with some extra information attached, such as the message level,
/// which aspect of the problem produced it, and some help on how to fix the issue.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The level of this message.
    level: DiagnosticLevel,
    /// The aspect that produced this message (e.g. "test case group data/secret").
    aspect: String,
    /// The main message to report.
    message: String,
    /// Additional notes to show next to the main message, e.g. a reproduction command.
    note: Option<String>,
}

impl Diagnostic {
    /// Create a new [`Diagnostic`] with [`DiagnosticLevel::Error`].
    pub fn error(aspect: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            aspect: aspect.into(),
            message: message.into(),
            note: None,
        }
    }

    /// Create a new [`Diagnostic`] with [`DiagnosticLevel::Warning`].
    pub fn warning(aspect: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            aspect: aspect.into(),
            message: message.into(),
            note: None,
        }
    }

    /// Attach a note to the diagnostic (e.g. "run `foo --bar` to reproduce").
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Get the level of the diagnostic.
    pub fn level(&self) -> DiagnosticLevel {
        self.level
    }

    /// Get the aspect that produced the diagnostic.
    pub fn aspect(&self) -> &str {
        &self.aspect
    }

    /// Get the message of this diagnostic.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the note attached to this diagnostic, if any.
    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let level = self.level.as_str();
        write!(
            f,
            "{}: in {}: {}",
            level.color(self.level.color()).bold(),
            self.aspect,
            self.message
        )?;
        if let Some(note) = &self.note {
            write!(f, "\n  {}: {}", "Note".bold(), note)?;
        }
        Ok(())
    }
}
