//! Discovery, compilation and verification of reference submissions, plus the time-limit
//! calibration that runs as a side effect of verifying the `accepted` category.

use std::path::Path;

use anyhow::{Context, Result};
use probver_diagnostics::{CheckState, Reporter};
use probver_lang::Program;

use crate::config::Limits;
use crate::result::Verdict;
use crate::testdata::{RunContext, TestCaseGroup};

/// The expected-verdict categories a submission directory maps to.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Category {
    /// `submissions/accepted/`; required, used to calibrate the time limit.
    Accepted,
    /// `submissions/wrong_answer/`; optional.
    WrongAnswer,
    /// `submissions/run_time_error/`; optional.
    RuntimeError,
    /// `submissions/time_limit_exceeded/`; optional.
    TimeLimitExceeded,
}

impl Category {
    const ALL: [Category; 4] = [
        Category::Accepted,
        Category::WrongAnswer,
        Category::RuntimeError,
        Category::TimeLimitExceeded,
    ];

    fn dirname(&self) -> &'static str {
        match self {
            Category::Accepted => "accepted",
            Category::WrongAnswer => "wrong_answer",
            Category::RuntimeError => "run_time_error",
            Category::TimeLimitExceeded => "time_limit_exceeded",
        }
    }

    /// Whether `verdict` is an acceptable outcome for a submission filed under this category.
    fn matches(&self, verdict: Verdict) -> bool {
        match self {
            Category::Accepted => verdict == Verdict::AC,
            Category::WrongAnswer => verdict == Verdict::WA,
            Category::RuntimeError => verdict == Verdict::RTE,
            Category::TimeLimitExceeded => verdict == Verdict::TLE,
        }
    }
}

/// The full set of reference submissions under `submissions/`.
#[derive(Debug)]
pub struct Submissions {
    submissions: Vec<SubmissionHandle>,
    check_state: CheckState,
}

struct SubmissionHandle {
    program: Program,
    category: Category,
}

impl std::fmt::Debug for Submissions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submissions")
            .field("count", &self.submissions.len())
            .field("check_state", &self.check_state)
            .finish()
    }
}

impl Submissions {
    /// Discover every program under each category's subdirectory.
    pub fn new(problemdir: &Path, work_dir: &Path) -> Result<Submissions> {
        let submissions_dir = problemdir.join("submissions");
        let mut submissions = Vec::new();

        for category in Category::ALL {
            let dir = submissions_dir.join(category.dirname());
            if !dir.is_dir() {
                continue;
            }
            let mut entries: Vec<_> = std::fs::read_dir(&dir)
                .with_context(|| format!("failed to read {:?}", dir))?
                .collect::<std::io::Result<_>>()?;
            entries.sort_by_key(|e| e.path());
            for entry in entries {
                let path = entry.path();
                if path.is_file() {
                    if let Some(program) = Program::new(&path, work_dir) {
                        submissions.push(SubmissionHandle { program, category });
                    }
                }
            }
        }

        Ok(Submissions {
            submissions,
            check_state: CheckState::Unchecked,
        })
    }

    /// Error if no accepted submissions were found.
    fn has_category(&self, category: Category) -> bool {
        self.submissions.iter().any(|s| s.category == category)
    }

    /// Compile and verify every submission, in category order, calibrating `limits.time` as a
    /// side effect of processing the `accepted` category.
    pub fn check(&mut self, testdata: &TestCaseGroup, limits: &mut Limits, run_ctx: &RunContext, reporter: &Reporter) -> bool {
        if self.check_state.is_checked() {
            return self.check_state.as_bool();
        }
        let reporter = reporter.for_aspect("submissions");
        let mut ok = true;

        if !self.has_category(Category::Accepted) {
            reporter.error("no accepted submissions found");
            ok = false;
        }

        let mut timelim = limits.time;
        let mut timelim_margin = limits.time;

        for category in Category::ALL {
            let mut max_ac_runtime: f64 = 0.0;
            let mut any_ac = false;

            for handle in &mut self.submissions {
                if handle.category != category {
                    continue;
                }
                let program = &mut handle.program;

                match program.compile() {
                    Ok(true) => {}
                    Ok(false) => {
                        reporter.error(format!("{} failed to compile", program.name()));
                        ok = false;
                        continue;
                    }
                    Err(e) => {
                        reporter.error(format!("{} failed to compile: {:#}", program.name(), e));
                        ok = false;
                        continue;
                    }
                }

                let (res1, res2) =
                    testdata.run_submission(program, timelim, timelim_margin, run_ctx);

                if res1.verdict != res2.verdict {
                    reporter.warning(format!(
                        "{} is sensitive to the time limit: {} at {}s vs {} at {}s",
                        program.name(),
                        res1.verdict,
                        timelim,
                        res2.verdict,
                        timelim_margin
                    ));
                }

                if !category.matches(res2.verdict) {
                    reporter.error(format!(
                        "{} is filed under {:?} but produced verdict {}",
                        program.name(),
                        category,
                        res2.verdict
                    ));
                    ok = false;
                }

                if category == Category::Accepted && res2.verdict == Verdict::AC {
                    any_ac = true;
                    if res2.runtime > max_ac_runtime {
                        max_ac_runtime = res2.runtime;
                    }
                }
            }

            if category == Category::Accepted && any_ac {
                let exact = max_ac_runtime * limits.time_multiplier;
                timelim = (exact.round() as i64).max(1) as f64;
                timelim_margin = (exact + 1.0).max((exact * limits.time_safety_margin).round());
                limits.time = timelim;
            }
        }

        self.check_state = if ok { CheckState::Ok } else { CheckState::Failed };
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_matches_expected_verdict() {
        assert!(Category::Accepted.matches(Verdict::AC));
        assert!(!Category::Accepted.matches(Verdict::WA));
        assert!(Category::WrongAnswer.matches(Verdict::WA));
    }

    #[test]
    fn no_accepted_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let mut submissions = Submissions::new(dir.path(), work.path()).unwrap();
        assert!(!submissions.has_category(Category::Accepted));
        let _ = &mut submissions;
    }

    #[test]
    fn discovers_accepted_submission() {
        let dir = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("submissions/accepted")).unwrap();
        std::fs::write(dir.path().join("submissions/accepted/ok.sh"), "#!/bin/sh\necho 42\n").unwrap();
        let submissions = Submissions::new(dir.path(), work.path()).unwrap();
        assert!(submissions.has_category(Category::Accepted));
        assert_eq!(submissions.submissions.len(), 1);
    }
}
