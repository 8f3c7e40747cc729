//! Verification engine for competitive-programming problem packages.
//!
//! Given a directory laid out with a problem statement, test data organized into groups,
//! input-format validators, output validators, optional graders, and categorized reference
//! submissions, this crate determines whether the package is internally consistent: every
//! reference submission produces the verdict its directory claims, every test input is accepted
//! by every input-format validator, every answer file is accepted by every output validator, and
//! the computed time limit is derived from the slowest accepted submission.

pub mod config;
pub mod graders;
pub mod input_validators;
pub mod output_validators;
pub mod problem;
pub mod result;
pub mod statement;
pub mod submissions;
pub mod testdata;

pub use config::{GradingConfig, Limits, NormalizedConfig, ProblemConfig, Validation};
pub use graders::Graders;
pub use input_validators::InputFormatValidators;
pub use output_validators::OutputValidators;
pub use problem::{Problem, ALL_ASPECTS};
pub use result::{OnReject, SubmissionResult, Verdict};
pub use statement::{ExternalConverter, Noop, ProblemStatement, ShellConverter};
pub use submissions::Submissions;
pub use testdata::{CheckContext, GroupConfig, Item, RunContext, TestCase, TestCaseGroup};
