//! Discovery and invocation of `graders/` programs, reducing a group's per-case sub-results into
//! a single verdict and score.

use std::path::Path;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use probver_diagnostics::{CheckState, Reporter};
use probver_lang::{Program, TerminationStatus};
use regex::Regex;

use crate::result::{SubmissionResult, Verdict};

lazy_static! {
    static ref GRADER_OUTPUT_RE: Regex = Regex::new(r"^(AC|WA|TLE|RTE)\s+([0-9.]+)\s*$").unwrap();
}

/// A program in `graders/`, plus the built-in default used for groups whose `grading` key is
/// `"default"`.
#[derive(Debug)]
pub struct Graders {
    programs: Vec<Program>,
    check_state: CheckState,
}

impl Graders {
    /// Discover every program under `problemdir/graders`.
    pub fn new(problemdir: &Path, work_dir: &Path) -> Result<Graders> {
        let graders_dir = problemdir.join("graders");
        let mut programs = Vec::new();
        if graders_dir.is_dir() {
            for entry in std::fs::read_dir(&graders_dir)
                .with_context(|| format!("failed to read {:?}", graders_dir))?
            {
                let entry = entry?;
                let path = entry.path();
                if path.is_file() {
                    if let Some(program) = Program::new(&path, work_dir) {
                        programs.push(program);
                    }
                }
            }
        }
        programs.sort_by_key(|p| p.name());
        Ok(Graders {
            programs,
            check_state: CheckState::Unchecked,
        })
    }

    /// Error if a pass-fail problem declares custom graders; error on any grader compile
    /// failure.
    pub fn check(&mut self, problem_type: &str, reporter: &Reporter) -> bool {
        if self.check_state.is_checked() {
            return self.check_state.as_bool();
        }
        let reporter = reporter.for_aspect("graders");
        let mut ok = true;

        if problem_type == "pass-fail" && !self.programs.is_empty() {
            reporter.error("there are grader programs but the problem is pass-fail");
            ok = false;
        }
        for program in &mut self.programs {
            match program.compile() {
                Ok(true) => {}
                Ok(false) => {
                    reporter.error(format!("compile error for grader {}", program.name()));
                    ok = false;
                }
                Err(e) => {
                    reporter.error(format!("compile error for grader {}: {:#}", program.name(), e));
                    ok = false;
                }
            }
        }

        self.check_state = if ok { CheckState::Ok } else { CheckState::Failed };
        ok
    }

    /// Reduce `results` (one per child case/group, in encounter order) into a single aggregate
    /// `SubmissionResult`, using either the discovered custom graders (`grading_key == "custom"`)
    /// or the built-in default grader.
    ///
    /// If multiple graders are present the last one's result wins (documented quirk; see
    /// `spec.md` §4.6/§9 Open Question 1 — the original leaves this as a TODO rather than
    /// resolving it).
    pub fn grade(
        &self,
        grading_key: &str,
        grader_flags: &[String],
        results: &[SubmissionResult],
        case_name: &str,
        work_dir: &Path,
        reporter: &Reporter,
    ) -> SubmissionResult {
        if grading_key != "custom" || self.programs.is_empty() {
            return default_grade(results, case_name);
        }

        let grader_input: String = results
            .iter()
            .map(|r| format!("{} {}\n", r.verdict, r.score.unwrap_or(0.0)))
            .collect();

        let mut last = default_grade(results, case_name);
        for grader in &self.programs {
            let infile = match write_scratch(work_dir, &grader_input) {
                Ok(path) => path,
                Err(e) => {
                    reporter.error(format!("failed to write grader input: {:#}", e));
                    return SubmissionResult::aggregate(Verdict::JE, None, results.to_vec(), case_name);
                }
            };
            let outfile = work_dir.join(format!(".grader_out_{}", fastrand::u64(..)));

            match grader.run(Some(&infile), Some(&outfile), grader_flags, None) {
                Ok((status, _runtime)) => {
                    if matches!(status, TerminationStatus::Signalled(_)) {
                        reporter.error(format!("judge error: grader {} crashed", grader.name()));
                        return SubmissionResult::aggregate(Verdict::JE, None, results.to_vec(), case_name);
                    }
                    let output = std::fs::read_to_string(&outfile).unwrap_or_default();
                    match GRADER_OUTPUT_RE.captures(output.trim_end_matches('\n')) {
                        Some(caps) => {
                            let verdict: Verdict = caps[1].parse().unwrap_or(Verdict::JE);
                            let score: f64 = caps[2].parse().unwrap_or(0.0);
                            last = SubmissionResult::aggregate(verdict, Some(score), results.to_vec(), case_name);
                        }
                        None => {
                            reporter.error("judge error: invalid format of grader output");
                            return SubmissionResult::aggregate(Verdict::JE, None, results.to_vec(), case_name);
                        }
                    }
                }
                Err(e) => {
                    reporter.error(format!("failed to run grader {}: {:#}", grader.name(), e));
                    return SubmissionResult::aggregate(Verdict::JE, None, results.to_vec(), case_name);
                }
            }
            let _ = std::fs::remove_file(&infile);
            let _ = std::fs::remove_file(&outfile);
        }
        last
    }
}

fn write_scratch(work_dir: &Path, contents: &str) -> Result<std::path::PathBuf> {
    let path = work_dir.join(format!(".grader_in_{}", fastrand::u64(..)));
    std::fs::write(&path, contents)?;
    Ok(path)
}

/// The built-in default grader: reduces by first-error, and scores as the sum of the children's
/// own scores. Stands in for the external `default_grader` binary the original locates next to
/// `verifyproblem.py`, the same way [`crate::output_validators::default_compare`] stands in for
/// the external `default_validator`.
fn default_grade(results: &[SubmissionResult], case_name: &str) -> SubmissionResult {
    let verdict = results
        .iter()
        .find(|r| r.verdict != Verdict::AC)
        .map(|r| r.verdict)
        .unwrap_or(Verdict::AC);
    let score = if results.iter().any(|r| r.score.is_some()) {
        Some(results.iter().filter_map(|r| r.score).sum())
    } else {
        None
    };
    SubmissionResult::aggregate(verdict, score, results.to_vec(), case_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grade_sums_scores() {
        let a = SubmissionResult::leaf(Verdict::AC, Some(0.4), "c1", 0.1);
        let b = SubmissionResult::leaf(Verdict::AC, Some(0.5), "c2", 0.1);
        let agg = default_grade(&[a, b], "group");
        assert_eq!(agg.verdict, Verdict::AC);
        assert_eq!(agg.score, Some(0.9));
    }

    #[test]
    fn default_grade_first_error_on_failure() {
        let a = SubmissionResult::leaf(Verdict::AC, Some(0.4), "c1", 0.1);
        let b = SubmissionResult::leaf(Verdict::WA, Some(0.0), "c2", 0.1);
        let agg = default_grade(&[a, b], "group");
        assert_eq!(agg.verdict, Verdict::WA);
    }

    #[test]
    fn grader_output_regex_accepts_expected_shape() {
        let caps = GRADER_OUTPUT_RE.captures("AC 0.9\n").unwrap();
        assert_eq!(&caps[1], "AC");
        assert_eq!(&caps[2], "0.9");
    }

    #[test]
    fn no_graders_found_when_directory_absent() {
        let dir = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let mut graders = Graders::new(dir.path(), work.path()).unwrap();
        let reporter = Reporter::new();
        assert!(graders.check("pass-fail", &reporter));
    }

    #[test]
    fn custom_graders_on_pass_fail_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("graders")).unwrap();
        std::fs::write(dir.path().join("graders/grade.sh"), "#!/bin/sh\necho AC 1.0\n").unwrap();
        let mut graders = Graders::new(dir.path(), work.path()).unwrap();
        let reporter = Reporter::new();
        assert!(!graders.check("pass-fail", &reporter));
    }
}
