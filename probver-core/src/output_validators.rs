//! Output validation: the built-in token comparator for `validation-type=default`, and the
//! discovered-program path (batch and interactive) for `validation-type=custom`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use probver_diagnostics::{CheckState, Reporter};
use probver_lang::Program;
use regex::Regex;

use crate::config::{GradingConfig, Validation};
use crate::result::{SubmissionResult, Verdict};

lazy_static! {
    static ref INTERACTIVE_WIRE_RE: Regex =
        Regex::new(r"^(\d+)\s+(\d+\.\d+)\s+(\d+)\s+(\d+\.\d+)\s*$").unwrap();
}

/// Compare `output` against `answer` the way the built-in default validator does: split both on
/// whitespace and require the token sequences to match exactly. Case- and punctuation-sensitive;
/// only runs of whitespace are collapsed.
pub fn default_compare(answer: &Path, output: &Path) -> Result<bool> {
    let expected = std::fs::read_to_string(answer)
        .with_context(|| format!("failed to read {:?}", answer))?;
    let got = std::fs::read_to_string(output)
        .with_context(|| format!("failed to read {:?}", output))?;
    Ok(expected.split_whitespace().eq(got.split_whitespace()))
}

/// Which validator programs actually back an [`OutputValidators`] instance.
#[derive(Debug)]
enum Mode {
    /// `validation-type=default`: use [`default_compare`].
    Default,
    /// `validation-type=custom`: the discovered programs, run in encounter order.
    Custom(Vec<Program>),
}

/// The output validator set for a problem: either the built-in default comparator, or one or
/// more discovered `output_validators/` programs.
#[derive(Debug)]
pub struct OutputValidators {
    mode: Mode,
    mode_consistent: bool,
    check_state: CheckState,
}

impl OutputValidators {
    /// Discover `output_validators/` programs and reconcile them against the declared
    /// `validation-type`.
    pub fn new(problemdir: &Path, validation: &Validation) -> Result<OutputValidators> {
        let validators_dir = problemdir.join("output_validators");
        let mut programs = Vec::new();
        if validators_dir.is_dir() {
            for entry in std::fs::read_dir(&validators_dir)
                .with_context(|| format!("failed to read {:?}", validators_dir))?
            {
                let entry = entry?;
                let path = entry.path();
                if path.is_file() {
                    if let Some(program) = Program::new(&path, &validators_dir) {
                        programs.push(program);
                    }
                } else if path.is_dir() {
                    for sub in std::fs::read_dir(&path)? {
                        let sub = sub?.path();
                        if sub.is_file() {
                            if let Some(program) = Program::new(&sub, &path) {
                                programs.push(program);
                            }
                        }
                    }
                }
            }
        }
        programs.sort_by_key(|p| p.name());

        let mode_consistent = match validation.validation_type.as_str() {
            "default" => programs.is_empty(),
            "custom" => !programs.is_empty(),
            _ => true,
        };

        let mode = if validation.validation_type == "default" {
            Mode::Default
        } else {
            Mode::Custom(programs)
        };
        Ok(OutputValidators {
            mode,
            mode_consistent,
            check_state: CheckState::Unchecked,
        })
    }

    /// Validate that, when custom, every discovered validator compiles.
    pub fn check(&mut self, reporter: &Reporter) -> bool {
        if self.check_state.is_checked() {
            return self.check_state.as_bool();
        }
        let reporter = reporter.for_aspect("output validators");
        let mut ok = true;

        if !self.mode_consistent {
            reporter.error("validation-type does not match what was discovered under output_validators/");
            ok = false;
        }

        if let Mode::Custom(programs) = &mut self.mode {
            if programs.is_empty() {
                reporter.error("validation-type=custom but no output validators were found");
                ok = false;
            }
            for program in programs {
                match program.compile() {
                    Ok(true) => {}
                    Ok(false) => {
                        reporter.error(format!("{} failed to compile", program.name()));
                        ok = false;
                    }
                    Err(e) => {
                        reporter.error(format!("{} failed to compile: {:#}", program.name(), e));
                        ok = false;
                    }
                }
            }
        }

        self.check_state = if ok { CheckState::Ok } else { CheckState::Failed };
        ok
    }

    /// Run one case through the batch validator contract: each validator gets a fresh feedback
    /// directory and sees `[infile, ansfile, feedbackdir] ++ flags`, with the submission's
    /// output piped to its stdin. Stops at the first non-AC validator.
    pub fn validate(
        &self,
        infile: &Path,
        ansfile: &Path,
        output: &Path,
        flags: &[String],
        grading: &GradingConfig,
        work_dir: &Path,
        case_name: &str,
    ) -> SubmissionResult {
        match &self.mode {
            Mode::Default => {
                match default_compare(ansfile, output) {
                    Ok(true) => SubmissionResult::leaf(Verdict::AC, grading.accept_score, case_name, 0.0),
                    Ok(false) => SubmissionResult::leaf(Verdict::WA, grading.reject_score, case_name, 0.0),
                    Err(e) => SubmissionResult::leaf(
                        Verdict::JE,
                        None,
                        format!("{}: default validator failed: {:#}", case_name, e),
                        0.0,
                    ),
                }
            }
            Mode::Custom(programs) => {
                for program in programs {
                    let feedbackdir = match tempfile::Builder::new()
                        .prefix("feedback")
                        .tempdir_in(work_dir)
                    {
                        Ok(dir) => dir,
                        Err(e) => {
                            return SubmissionResult::leaf(
                                Verdict::JE,
                                None,
                                format!("{}: failed to create feedback dir: {:#}", case_name, e),
                                0.0,
                            )
                        }
                    };
                    let mut args = vec![
                        infile.to_string_lossy().to_string(),
                        ansfile.to_string_lossy().to_string(),
                        feedbackdir.path().to_string_lossy().to_string(),
                    ];
                    args.extend(flags.iter().cloned());
                    let result = match program.run(Some(output), None, &args, None) {
                        Ok((status, _runtime)) => {
                            let signalled =
                                matches!(status, probver_lang::TerminationStatus::Signalled(_));
                            parse_validator_result(status.exit_code(), signalled, feedbackdir.path(), grading, case_name)
                        }
                        Err(e) => SubmissionResult::leaf(
                            Verdict::JE,
                            None,
                            format!("{}: failed to run {}: {:#}", case_name, program.name(), e),
                            0.0,
                        ),
                    };
                    if result.verdict != Verdict::AC {
                        return result;
                    }
                }
                SubmissionResult::leaf(Verdict::AC, grading.accept_score, case_name, 0.0)
            }
        }
    }
}

/// Implements `_parse_validator_results`: reconcile the validator's exit status with any
/// `score.txt` it may have left behind in `feedbackdir`.
fn parse_validator_result(
    exit_code: Option<i32>,
    signalled: bool,
    feedbackdir: &Path,
    grading: &GradingConfig,
    case_name: &str,
) -> SubmissionResult {
    let score_file = feedbackdir.join("score.txt");
    let score_contents = std::fs::read_to_string(&score_file).ok();

    if !grading.custom_scoring {
        if score_contents.is_some() {
            return SubmissionResult::leaf(
                Verdict::JE,
                None,
                format!("{}: validator wrote score.txt but scoring is not custom", case_name),
                0.0,
            );
        }
    }

    if signalled {
        return SubmissionResult::leaf(Verdict::JE, None, format!("{}: validator was signalled", case_name), 0.0);
    }

    let parsed_score = if grading.custom_scoring {
        match score_contents.as_deref().map(str::trim).map(str::parse::<f64>) {
            Some(Ok(score)) => Some(score),
            _ => {
                return SubmissionResult::leaf(
                    Verdict::JE,
                    None,
                    format!("{}: custom scoring requires a valid score.txt", case_name),
                    0.0,
                )
            }
        }
    } else {
        None
    };

    match exit_code {
        Some(42) => SubmissionResult::leaf(
            Verdict::AC,
            parsed_score.or(grading.accept_score),
            case_name,
            0.0,
        ),
        Some(43) => SubmissionResult::leaf(
            Verdict::WA,
            parsed_score.or(grading.reject_score),
            case_name,
            0.0,
        ),
        _ => SubmissionResult::leaf(Verdict::JE, None, format!("{}: validator exited abnormally", case_name), 0.0),
    }
}

/// Locate the bundled interactive runner binary. Interactive validation needs a small
/// process-juggling helper (it launches the validator and the submission side by side, wiring
/// their stdio together) that is itself an external program rather than library code, matching
/// how the batch validators are external programs too.
fn find_interactive_runner() -> Option<PathBuf> {
    std::env::var_os("PROBVER_INTERACTIVE_RUNNER").map(PathBuf::from)
}

/// Run one case through the interactive validation contract.
///
/// Unlike the batch contract, the fixed argv shape here has no room for `validator_flags`: the
/// validator command ends at `feedbackdir`, immediately followed by the `";"` separator and the
/// submission command (`spec.md` §4.5/§9 Open Question 3 — the original does not append them
/// either, preserved here rather than "fixed").
pub fn validate_interactive(
    validators: &OutputValidators,
    infile: &Path,
    ansfile: &Path,
    submission_runcmd: &[String],
    timelim: f64,
    grading: &GradingConfig,
    work_dir: &Path,
    case_name: &str,
) -> SubmissionResult {
    let programs = match &validators.mode {
        Mode::Custom(programs) => programs,
        Mode::Default => {
            return SubmissionResult::leaf(
                Verdict::JE,
                None,
                format!("{}: interactive validation requires custom validators", case_name),
                0.0,
            )
        }
    };

    let Some(runner) = find_interactive_runner() else {
        return SubmissionResult::leaf(
            Verdict::JE,
            None,
            format!("{}: no interactive runner available", case_name),
            0.0,
        );
    };

    for program in programs {
        let feedbackdir = match tempfile::Builder::new().prefix("feedback").tempdir_in(work_dir) {
            Ok(dir) => dir,
            Err(e) => {
                return SubmissionResult::leaf(
                    Verdict::JE,
                    None,
                    format!("{}: failed to create feedback dir: {:#}", case_name, e),
                    0.0,
                )
            }
        };
        let scratch = feedbackdir.path().join(".interactive_wire");

        let mut validator_runcmd = program.get_runcmd();
        validator_runcmd.push(infile.to_string_lossy().to_string());
        validator_runcmd.push(ansfile.to_string_lossy().to_string());
        validator_runcmd.push(feedbackdir.path().to_string_lossy().to_string());

        let mut argv = vec!["1".to_string(), format!("{}", 2.0 * timelim)];
        argv.extend(validator_runcmd);
        argv.push(";".to_string());
        argv.extend(submission_runcmd.iter().cloned());

        let status = std::process::Command::new(&runner)
            .args(&argv)
            .current_dir(work_dir)
            .stdout(std::fs::File::create(&scratch).ok().map_or(std::process::Stdio::null(), Into::into))
            .status();

        if status.is_err() {
            return SubmissionResult::leaf(
                Verdict::JE,
                None,
                format!("{}: failed to invoke interactive runner", case_name),
                0.0,
            );
        }

        let wire = std::fs::read_to_string(&scratch).unwrap_or_default();
        let Some(caps) = INTERACTIVE_WIRE_RE.captures(wire.trim()) else {
            return SubmissionResult::leaf(
                Verdict::JE,
                None,
                format!("{}: malformed interactive wire line {:?}", case_name, wire),
                0.0,
            );
        };
        let val_status: i32 = caps[1].parse().unwrap_or(0);
        let sub_status: i32 = caps[3].parse().unwrap_or(0);
        let sub_runtime: f64 = caps[4].parse().unwrap_or(0.0);

        // Both tokens are raw wait-status words, not bare exit codes: the submission side may
        // have been killed by SIGXCPU/SIGUSR1 (TLE) or any other signal (RTE), and the validator
        // side may itself have crashed (JE) instead of exiting 42/43.
        let sub_term = probver_lang::TerminationStatus::from_raw_wait_status(sub_status);
        let result = if sub_term.is_tle(true) {
            SubmissionResult::leaf(Verdict::TLE, grading.reject_score, case_name, sub_runtime)
        } else if sub_term.is_rte() {
            SubmissionResult::leaf(Verdict::RTE, grading.reject_score, case_name, sub_runtime)
        } else {
            let val_term = probver_lang::TerminationStatus::from_raw_wait_status(val_status);
            let (exit_code, signalled) = match val_term {
                probver_lang::TerminationStatus::Exited(code) => (Some(code), false),
                probver_lang::TerminationStatus::Signalled(_) => (None, true),
            };
            let mut leaf = parse_validator_result(exit_code, signalled, feedbackdir.path(), grading, case_name);
            leaf.runtime = sub_runtime;
            leaf.runtime_reason = case_name.to_string();
            leaf
        };

        if result.verdict != Verdict::AC {
            return result;
        }
    }

    SubmissionResult::leaf(Verdict::AC, grading.accept_score, case_name, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(path: &Path, contents: &str) {
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn default_compare_ignores_whitespace_runs() {
        let dir = tempfile::tempdir().unwrap();
        let ans = dir.path().join("a.ans");
        let out = dir.path().join("a.out");
        write_file(&ans, "1 2 3\n");
        write_file(&out, "1  2\n3\n");
        assert!(default_compare(&ans, &out).unwrap());
    }

    #[test]
    fn default_compare_rejects_different_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let ans = dir.path().join("a.ans");
        let out = dir.path().join("a.out");
        write_file(&ans, "1 2 3\n");
        write_file(&out, "1 2 4\n");
        assert!(!default_compare(&ans, &out).unwrap());
    }

    #[test]
    fn interactive_wire_regex_matches_four_tokens() {
        let caps = INTERACTIVE_WIRE_RE.captures("0 0.01 10 1.60\n").unwrap();
        assert_eq!(&caps[1], "0");
        assert_eq!(&caps[3], "10");
        assert_eq!(&caps[4], "1.60");
    }

    #[test]
    fn sub_status_signalled_with_usr1_decodes_to_tle() {
        // SIGUSR1 is 10 on Linux; a raw wait status equal to the bare signal number means the
        // process was killed by it (low 7 bits hold the terminating signal).
        let term = probver_lang::TerminationStatus::from_raw_wait_status(10);
        assert!(term.is_tle(true));
        assert!(!matches!(term, probver_lang::TerminationStatus::Exited(_)));
    }
}
