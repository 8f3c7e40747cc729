//! Discovery and execution of `input_format_validators/` programs.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use probver_diagnostics::{CheckState, Reporter};
use probver_lang::Program;

/// A fixed 200-byte ASCII string used as a negative sanity-check input: a well-behaved validator
/// should reject it under essentially any flag set.
fn random_ascii_bytes() -> Vec<u8> {
    (0..200)
        .map(|_| {
            let idx = fastrand::u8(0..95);
            32 + idx
        })
        .collect()
}

/// The input format validators declared for a problem, plus the bookkeeping needed to run the
/// over-permissiveness sanity check at most once per distinct flag set.
#[derive(Debug)]
pub struct InputFormatValidators {
    programs: Vec<Program>,
    random_input: PathBuf,
    seen_flags: RefCell<HashSet<Vec<String>>>,
    check_state: CheckState,
}

impl InputFormatValidators {
    /// Discover validator programs under `problemdir/input_format_validators`, and materialize
    /// the random-input sanity file under `work_dir`.
    pub fn new(problemdir: &Path, work_dir: &Path) -> Result<InputFormatValidators> {
        let validators_dir = problemdir.join("input_format_validators");
        let mut programs = Vec::new();
        if validators_dir.is_dir() {
            for entry in std::fs::read_dir(&validators_dir)
                .with_context(|| format!("failed to read {:?}", validators_dir))?
            {
                let entry = entry?;
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                if let Some(program) = Program::new(path, work_dir) {
                    programs.push(program);
                }
            }
        }
        programs.sort_by_key(|p| p.name());

        let random_input = work_dir.join(".random_sanity_input");
        std::fs::write(&random_input, random_ascii_bytes())
            .with_context(|| format!("failed to write {:?}", random_input))?;

        Ok(InputFormatValidators {
            programs,
            random_input,
            seen_flags: RefCell::new(HashSet::new()),
            check_state: CheckState::Unchecked,
        })
    }

    /// Validate that at least one validator was found and that all of them compile.
    pub fn check(&mut self, reporter: &Reporter) -> bool {
        if self.check_state.is_checked() {
            return self.check_state.as_bool();
        }
        let reporter = reporter.for_aspect("input format validators");
        let mut ok = true;

        if self.programs.is_empty() {
            reporter.error("no input format validators found");
            ok = false;
        }
        for program in &mut self.programs {
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

        self.check_state = if ok { CheckState::Ok } else { CheckState::Failed };
        ok
    }

    /// Run every validator against `infile` with the given flags. Reports an error for any
    /// validator that does not exit with status 42 (accept). Also runs the over-permissiveness
    /// sanity check once per distinct flag set.
    pub fn validate(&self, infile: &Path, flags: &[String], case_name: &str, reporter: &Reporter) {
        for program in &self.programs {
            match program.run(Some(infile), None, flags, None) {
                Ok((status, _runtime)) => {
                    if status.exit_code() != Some(42) {
                        reporter.error(format!(
                            "{}: input validator {} rejected test case {} (status {:?})",
                            case_name,
                            program.name(),
                            case_name,
                            status
                        ));
                    }
                }
                Err(e) => reporter.error(format!(
                    "{}: failed to run input validator {}: {:#}",
                    case_name,
                    program.name(),
                    e
                )),
            }
        }

        if self.seen_flags.borrow_mut().insert(flags.to_vec()) {
            self.check_random_sanity(flags, reporter);
        }
    }

    fn check_random_sanity(&self, flags: &[String], reporter: &Reporter) {
        for program in &self.programs {
            match program.run(Some(&self.random_input), None, flags, None) {
                Ok((status, _)) if status.exit_code() == Some(42) => {
                    reporter.warning(format!(
                        "{} accepts random ASCII input with flags {:?}; looks over-permissive",
                        program.name(),
                        flags
                    ));
                }
                Ok(_) => {}
                Err(e) => reporter.warning(format!(
                    "failed to run over-permissiveness check for {}: {:#}",
                    program.name(),
                    e
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_validators_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let mut validators = InputFormatValidators::new(dir.path(), work.path()).unwrap();
        let reporter = Reporter::new();
        assert!(!validators.check(&reporter));
    }

    #[test]
    fn random_input_is_200_bytes() {
        assert_eq!(random_ascii_bytes().len(), 200);
    }
}
