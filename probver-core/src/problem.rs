//! Top-level lifecycle: stage a working copy of a problem directory, wire every component
//! together in dependency order, and drive `check()` across the requested aspects.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use probver_diagnostics::Reporter;
use regex::Regex;

use crate::config::ProblemConfig;
use crate::graders::Graders;
use crate::input_validators::InputFormatValidators;
use crate::output_validators::OutputValidators;
use crate::statement::{ExternalConverter, ProblemStatement};
use crate::submissions::Submissions;
use crate::testdata::{CheckContext, RunContext, TestCaseGroup};

lazy_static! {
    static ref SHORTNAME_RE: Regex = Regex::new(r"^[a-z0-9]+$").unwrap();
}

/// The canonical aspect names `check(items, ...)` accepts, in the fixed order they run.
pub const ALL_ASPECTS: &[&str] = &[
    "config",
    "statement",
    "input_validators",
    "output_validators",
    "graders",
    "testdata",
    "submissions",
];

/// A staged, fully-wired problem package, ready to be checked.
pub struct Problem {
    shortname: String,
    work_dir: tempfile::TempDir,
    config: ProblemConfig,
    statement: ProblemStatement,
    input_validators: InputFormatValidators,
    output_validators: OutputValidators,
    graders: Graders,
    testdata: TestCaseGroup,
    submissions: Submissions,
    reporter: Reporter,
}

impl Problem {
    /// Stage `problemdir` into a fresh temporary directory and construct every component, in the
    /// fixed order: statement, config, input validators, output validators, graders, testdata,
    /// submissions. The staged copy (and everything under it) is removed when the returned
    /// `Problem` is dropped, on every exit path including error returns from later construction
    /// steps.
    pub fn load(problemdir: &Path) -> Result<Problem> {
        let shortname = problemdir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let work_dir = tempfile::Builder::new()
            .prefix("probver-")
            .tempdir()
            .context("failed to create staging directory")?;
        copy_tree(problemdir, work_dir.path())
            .with_context(|| format!("failed to stage {:?} into {:?}", problemdir, work_dir.path()))?;
        let staged = work_dir.path();

        let reporter = Reporter::new();

        let statement = ProblemStatement::new(staged);
        let config = ProblemConfig::load(staged)?;
        let preview = config.preview();

        let input_validators = InputFormatValidators::new(staged, staged)?;
        let output_validators = OutputValidators::new(staged, &preview.validation)?;
        let graders = Graders::new(staged, staged)?;
        let testdata = TestCaseGroup::discover(&staged.join("data"), None, String::new())?;
        let submissions = Submissions::new(staged, staged)?;

        Ok(Problem {
            shortname,
            work_dir,
            config,
            statement,
            input_validators,
            output_validators,
            graders,
            testdata,
            submissions,
            reporter,
        })
    }

    /// The staged working copy's root.
    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    /// The normalized configuration, including `limits.time` as calibrated by the most recent
    /// `check()` that ran the `submissions` aspect. Panics if `check()` has not run yet (mirrors
    /// `ProblemConfig::normalized`).
    pub fn config(&self) -> &ProblemConfig {
        &self.config
    }

    /// Validate `shortname` and run the requested aspects' `check()` in the fixed canonical
    /// order, short-circuiting further aspects once `bail_on_error` is set and an error has been
    /// reported. Returns the reporter so the caller can read final counters/diagnostics.
    pub fn check(&mut self, items: &[&str], bail_on_error: bool, converter: &dyn ExternalConverter) -> Reporter {
        self.reporter.reset();

        if !SHORTNAME_RE.is_match(&self.shortname) {
            self.reporter
                .for_aspect("problem")
                .error(format!("invalid shortname {:?}, expected [a-z0-9]+", self.shortname));
        }

        let run = |name: &str| items.is_empty() || items.contains(&name);

        // `graders`/`testdata`/`submissions` all read `config.normalized()`, so config must be
        // validated at least once before them regardless of whether the caller asked for the
        // "config" aspect specifically; `check()` is memoized so this never double-reports.
        self.config.check(&self.reporter);

        for aspect in ALL_ASPECTS {
            if bail_on_error && self.reporter.errors() > 0 {
                break;
            }
            if !run(aspect) {
                continue;
            }
            match *aspect {
                "config" => {
                    self.config.check(&self.reporter);
                }
                "statement" => {
                    self.statement.check(&self.reporter, converter);
                }
                "input_validators" => {
                    self.input_validators.check(&self.reporter);
                }
                "output_validators" => {
                    self.output_validators.check(&self.reporter);
                }
                "graders" => {
                    self.graders.check(&self.config.normalized().problem_type, &self.reporter);
                }
                "testdata" => {
                    let ctx = CheckContext {
                        input_validators: &self.input_validators,
                        output_limit_mib: self.config.normalized().limits.output,
                    };
                    self.testdata.check(&ctx, &self.reporter, true);
                }
                "submissions" => {
                    let normalized = self.config.normalized().clone();
                    let run_ctx = RunContext {
                        output_validators: &self.output_validators,
                        graders: &self.graders,
                        grading: &normalized.grading,
                        problem_type: &normalized.problem_type,
                        validation: &normalized.validation,
                        global_validator_flags: &normalized.validator_flags,
                        work_dir: self.work_dir.path(),
                        reporter: &self.reporter,
                    };
                    let mut limits = normalized.limits;
                    self.submissions
                        .check(&self.testdata, &mut limits, &run_ctx, &self.reporter);
                    self.config.set_calibrated_limits(limits);
                }
                _ => {}
            }
        }

        self.reporter.clone()
    }
}

fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in std::fs::read_dir(src).with_context(|| format!("failed to read {:?}", src))? {
        let entry = entry?;
        let path = entry.path();
        let target = dst.join(entry.file_name());
        if path.is_dir() {
            std::fs::create_dir_all(&target)?;
            copy_tree(&path, &target)?;
        } else {
            std::fs::copy(&path, &target)
                .with_context(|| format!("failed to copy {:?} to {:?}", path, target))?;
        }
    }
    Ok(())
}
