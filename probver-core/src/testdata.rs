//! The recursive test-data tree: [`TestCase`] leaves and [`TestCaseGroup`] nodes, with
//! inherited-and-merged `testdata.yaml` configuration, pairing/duplicate validation, and the
//! two-limit submission-running and result-aggregation logic.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use probver_diagnostics::Reporter;
use probver_lang::{Program, TerminationStatus};
use serde_yaml::Value;

use crate::config::{GradingConfig, Validation};
use crate::graders::Graders;
use crate::input_validators::InputFormatValidators;
use crate::output_validators::{self, OutputValidators};
use crate::result::{reduce_verdict, OnReject, SubmissionResult, Verdict};

const KNOWN_GROUP_KEYS: &[&str] = &[
    "grading",
    "grader_flags",
    "input_validator_flags",
    "output_validator_flags",
];

/// Per-group configuration, inherited from the parent and overridden by `testdata.yaml`.
#[derive(Debug, Clone)]
pub struct GroupConfig {
    /// `default` or `custom`.
    pub grading: String,
    /// Flags appended to the grader invocation for this group.
    pub grader_flags: Vec<String>,
    /// Flags appended to input validator invocations for cases in this group.
    pub input_validator_flags: Vec<String>,
    /// Flags appended to output validator invocations for cases in this group.
    pub output_validator_flags: Vec<String>,
}

impl Default for GroupConfig {
    fn default() -> Self {
        GroupConfig {
            grading: "default".to_string(),
            grader_flags: vec![],
            input_validator_flags: vec![],
            output_validator_flags: vec![],
        }
    }
}

/// Read-only services every `TestCase`/`TestCaseGroup` needs to check itself, threaded in
/// explicitly instead of held as a back-reference (`spec.md` §9's "pass the problem context
/// explicitly into methods" resolution of the cyclic-reference design note).
pub struct CheckContext<'a> {
    /// Input format validators, run against every `.in` file.
    pub input_validators: &'a InputFormatValidators,
    /// `limits.output`, in MiB, from `problem.yaml`.
    pub output_limit_mib: u64,
}

/// Read-only services needed to run a submission through the tree.
pub struct RunContext<'a> {
    /// Output validators (batch or interactive).
    pub output_validators: &'a OutputValidators,
    /// Graders, for `type=scoring` groups.
    pub graders: &'a Graders,
    /// The problem's grading configuration (`accept_score`/`reject_score`/`on_reject`/...).
    pub grading: &'a GradingConfig,
    /// `pass-fail` or `scoring`.
    pub problem_type: &'a str,
    /// Validation type/params (selects interactive vs batch).
    pub validation: &'a Validation,
    /// The global `validator_flags` from `problem.yaml`, prepended ahead of the group's own.
    pub global_validator_flags: &'a [String],
    /// Scratch directory for feedback dirs and interactive wire files.
    pub work_dir: &'a Path,
    /// Where to report judge-level problems (a crashing grader, a missing interactive runner).
    pub reporter: &'a Reporter,
}

/// A single `.in`/`.ans` pair.
#[derive(Debug, Clone)]
pub struct TestCase {
    /// Path to the `.in` file.
    pub infile: PathBuf,
    /// Path to the `.ans` file.
    pub ansfile: PathBuf,
    /// Display name, e.g. `"secret/03"`, used as `reason`/`runtime_reason` witness and in
    /// diagnostics.
    pub name: String,
}

impl TestCase {
    /// Warn on files containing non-standard (`\r`) line breaks; validate the input against
    /// every input-format validator; error if the answer file exceeds the output limit, warn if
    /// it's within 50% of it.
    pub fn check(&self, cfg: &GroupConfig, ctx: &CheckContext, reporter: &Reporter) -> bool {
        let mut ok = true;
        for file in [&self.infile, &self.ansfile] {
            if let Ok(data) = std::fs::read(file) {
                if data.contains(&b'\r') {
                    reporter.warning(format!(
                        "{}: {:?} contains non-standard line breaks",
                        self.name, file
                    ));
                }
            }
        }

        ctx.input_validators
            .validate(&self.infile, &cfg.input_validator_flags, &self.name, reporter);

        if let Ok(metadata) = std::fs::metadata(&self.ansfile) {
            let limit_bytes = ctx.output_limit_mib * 1024 * 1024;
            let size = metadata.len();
            if size > limit_bytes {
                reporter.error(format!(
                    "{}: answer file ({:.1} MiB) is larger than the output limit ({} MiB); increase limits.output",
                    self.name,
                    size as f64 / 1024.0 / 1024.0,
                    ctx.output_limit_mib
                ));
                ok = false;
            } else if 2 * size > limit_bytes {
                reporter.warning(format!(
                    "{}: answer file ({:.1} MiB) is within 50% of the output limit ({} MiB); you might want to increase it",
                    self.name,
                    size as f64 / 1024.0 / 1024.0,
                    ctx.output_limit_mib
                ));
            }
        }

        ok
    }

    /// Run `submission` against this case under both time limits in a single execution, per
    /// `spec.md` §4.7: the low-limit verdict is derived from the high-limit run's measured
    /// runtime, never by re-executing.
    pub fn run_submission(
        &self,
        submission: &Program,
        timelim_low: f64,
        timelim_high: f64,
        cfg: &GroupConfig,
        ctx: &RunContext,
    ) -> (SubmissionResult, SubmissionResult) {
        let mut flags = ctx.global_validator_flags.to_vec();
        flags.extend(cfg.output_validator_flags.iter().cloned());

        let mut res2 = if ctx.validation.is_interactive() {
            output_validators::validate_interactive(
                ctx.output_validators,
                &self.infile,
                &self.ansfile,
                &submission.get_runcmd(),
                timelim_high,
                ctx.grading,
                ctx.work_dir,
                &self.name,
            )
        } else {
            let outfile = ctx.work_dir.join(format!(".out_{}", fastrand::u64(..)));
            let run_result = submission.run(
                Some(&self.infile),
                Some(&outfile),
                &[],
                Some(timelim_high.ceil() as u64),
            );
            let result = match run_result {
                Ok((status, runtime)) => {
                    let mut result = if status.is_tle(false) {
                        SubmissionResult::leaf(Verdict::TLE, ctx.grading.reject_score, &self.name, runtime)
                    } else if status.is_rte() {
                        SubmissionResult::leaf(Verdict::RTE, ctx.grading.reject_score, &self.name, runtime)
                    } else {
                        ctx.output_validators.validate(
                            &self.infile,
                            &self.ansfile,
                            &outfile,
                            &flags,
                            ctx.grading,
                            ctx.work_dir,
                            &self.name,
                        )
                    };
                    result.runtime = runtime;
                    result
                }
                Err(e) => SubmissionResult::leaf(
                    Verdict::JE,
                    None,
                    format!("{}: failed to run submission: {:#}", self.name, e),
                    0.0,
                ),
            };
            let _ = std::fs::remove_file(&outfile);
            result
        };

        let mut res1 = if res2.runtime <= timelim_low {
            res2.clone()
        } else {
            SubmissionResult::leaf(Verdict::TLE, ctx.grading.reject_score, &self.name, res2.runtime)
        };

        for res in [&mut res1, &mut res2] {
            res.reason = self.name.clone();
            res.runtime_reason = self.name.clone();
            if res.verdict == Verdict::AC {
                res.ac_runtime = Some(res.runtime);
                res.ac_runtime_reason = Some(self.name.clone());
            }
        }

        (res1, res2)
    }
}

/// An item in a [`TestCaseGroup`]: either a leaf case or a nested group.
#[derive(Debug)]
pub enum Item {
    /// A `.in`/`.ans` pair.
    Case(TestCase),
    /// A nested directory.
    Group(TestCaseGroup),
}

/// A node in the test-data tree.
#[derive(Debug)]
pub struct TestCaseGroup {
    /// Display name, e.g. `"secret"` or `"secret/group1"`; empty for the root.
    pub name: String,
    /// This group's merged configuration.
    pub config: GroupConfig,
    /// Children, sorted by filename.
    pub items: Vec<Item>,
    unmatched_in: Vec<PathBuf>,
    unmatched_ans: Vec<PathBuf>,
    unknown_keys: Vec<String>,
    invalid_grading: bool,
}

impl TestCaseGroup {
    /// Recursively discover the tree rooted at `datadir`. `parent_config` is `None` only for the
    /// root.
    pub fn discover(datadir: &Path, parent_config: Option<&GroupConfig>, name: String) -> Result<TestCaseGroup> {
        let (config, unknown_keys, invalid_grading) = load_group_config(datadir, parent_config)?;

        let mut entries: Vec<PathBuf> = if datadir.is_dir() {
            std::fs::read_dir(datadir)
                .with_context(|| format!("failed to read {:?}", datadir))?
                .map(|e| e.map(|e| e.path()))
                .collect::<std::io::Result<_>>()?
        } else {
            vec![]
        };
        entries.sort();

        let mut ins: Vec<PathBuf> = vec![];
        let mut anss: Vec<PathBuf> = vec![];
        let mut items = vec![];

        for path in &entries {
            if path.is_dir() {
                let sub_name = path.file_name().unwrap().to_string_lossy().to_string();
                let full_name = if name.is_empty() {
                    sub_name
                } else {
                    format!("{}/{}", name, sub_name)
                };
                items.push(Item::Group(TestCaseGroup::discover(path, Some(&config), full_name)?));
            } else if let Some(ext) = path.extension() {
                if ext == "in" {
                    ins.push(path.clone());
                } else if ext == "ans" {
                    anss.push(path.clone());
                }
            }
        }

        let mut unmatched_in = vec![];
        let mut unmatched_ans = vec![];
        for infile in &ins {
            let ansfile = infile.with_extension("ans");
            if anss.contains(&ansfile) {
                let base = infile.file_stem().unwrap().to_string_lossy().to_string();
                let case_name = if name.is_empty() {
                    base
                } else {
                    format!("{}/{}", name, base)
                };
                items.push(Item::Case(TestCase {
                    infile: infile.clone(),
                    ansfile,
                    name: case_name,
                }));
            } else {
                unmatched_in.push(infile.clone());
            }
        }
        for ansfile in &anss {
            let infile = ansfile.with_extension("in");
            if !ins.contains(&infile) {
                unmatched_ans.push(ansfile.clone());
            }
        }

        items.sort_by(|a, b| item_sort_key(a).cmp(&item_sort_key(b)));

        Ok(TestCaseGroup {
            name,
            config,
            items,
            unmatched_in,
            unmatched_ans,
            unknown_keys,
            invalid_grading,
        })
    }

    /// Validate this group and every descendant. `is_root` enables the top-level-only rules
    /// (`sample`/`secret` subgroups, global duplicate-input scan).
    pub fn check(&self, ctx: &CheckContext, reporter: &Reporter, is_root: bool) -> bool {
        let aspect_name = if self.name.is_empty() {
            "test data".to_string()
        } else {
            format!("test data group {}", self.name)
        };
        let group_reporter = reporter.for_aspect(aspect_name);
        let mut ok = true;

        if self.invalid_grading {
            group_reporter.error("invalid grading policy in testdata.yaml");
            ok = false;
        }
        for key in &self.unknown_keys {
            group_reporter.warning(format!("unknown key {:?} in testdata.yaml", key));
        }

        if is_root {
            let mut seen_sample = false;
            let mut seen_secret = false;
            for item in &self.items {
                match item {
                    Item::Group(g) => {
                        let basename = g.name.rsplit('/').next().unwrap_or(&g.name);
                        match basename {
                            "secret" => seen_secret = true,
                            "sample" => seen_sample = true,
                            _ => {
                                group_reporter.error(format!(
                                    "test data at top level can only have the groups sample and secret, found {:?}",
                                    basename
                                ));
                                ok = false;
                            }
                        }
                    }
                    Item::Case(_) => {
                        group_reporter.error("can't have individual test data files at top level");
                        ok = false;
                    }
                }
            }
            if !seen_secret {
                group_reporter.error("no secret data provided");
                ok = false;
            }
            if !seen_sample {
                group_reporter.warning("no sample data provided");
            }

            for (_, files) in duplicate_input_groups(self) {
                group_reporter.warning(format!("identical input files: {:?}", files));
            }
        }

        for f in &self.unmatched_in {
            group_reporter.error(format!("no matching answer file for input {:?}", f));
            ok = false;
        }
        for f in &self.unmatched_ans {
            group_reporter.error(format!("no matching input file for answer {:?}", f));
            ok = false;
        }

        for item in &self.items {
            match item {
                Item::Case(case) => {
                    if !case.check(&self.config, ctx, &group_reporter) {
                        ok = false;
                    }
                }
                Item::Group(group) => {
                    if !group.check(ctx, reporter, false) {
                        ok = false;
                    }
                }
            }
        }

        ok
    }

    /// Recursively run `submission` through every descendant, aggregating with
    /// [`compute_result`]. Returns `(reported, shadow)`.
    pub fn run_submission(
        &self,
        submission: &Program,
        timelim_low: f64,
        timelim_high: f64,
        ctx: &RunContext,
    ) -> (SubmissionResult, SubmissionResult) {
        let mut subres1 = vec![];
        let mut subres2 = vec![];

        for item in &self.items {
            let (r1, r2) = match item {
                Item::Case(case) => case.run_submission(submission, timelim_low, timelim_high, &self.config, ctx),
                Item::Group(group) => group.run_submission(submission, timelim_low, timelim_high, ctx),
            };
            let stop = ctx.on_reject_is_first_error() && r2.verdict != Verdict::AC;
            subres1.push(r1);
            subres2.push(r2);
            if stop {
                break;
            }
        }

        let on_reject = ctx.on_reject();
        let r1 = compute_result(&subres1, ctx.problem_type, on_reject, &self.config, ctx, &self.name, false);
        let r2 = compute_result(&subres2, ctx.problem_type, on_reject, &self.config, ctx, &self.name, true);
        (r1, r2)
    }

    /// Every `.in` file under this subtree, depth-first, for the duplicate-input scan.
    fn all_infiles(&self) -> Vec<(&Path, &str)> {
        let mut out = vec![];
        for item in &self.items {
            match item {
                Item::Case(c) => out.push((c.infile.as_path(), c.name.as_str())),
                Item::Group(g) => out.extend(g.all_infiles()),
            }
        }
        out
    }
}

impl<'a> RunContext<'a> {
    fn on_reject(&self) -> OnReject {
        match self.grading.on_reject.as_str() {
            "worst_error" => OnReject::WorstError,
            "grade" => OnReject::Grade,
            _ => OnReject::FirstError,
        }
    }

    fn on_reject_is_first_error(&self) -> bool {
        matches!(self.on_reject(), OnReject::FirstError)
    }
}

/// Reduce `sub_results` into a group-level `SubmissionResult`, delegating to the grader for
/// `type=scoring` problems whose aggregate verdict is AC (`spec.md` §4.8).
#[allow(clippy::too_many_arguments)]
fn compute_result(
    sub_results: &[SubmissionResult],
    probtype: &str,
    on_reject: OnReject,
    cfg: &GroupConfig,
    ctx: &RunContext,
    name: &str,
    shadow: bool,
) -> SubmissionResult {
    let verdict = reduce_verdict(sub_results, on_reject);
    if probtype == "scoring" && verdict == Verdict::AC {
        let _ = shadow;
        ctx.graders.grade(
            &cfg.grading,
            &cfg.grader_flags,
            sub_results,
            name,
            ctx.work_dir,
            ctx.reporter,
        )
    } else {
        SubmissionResult::aggregate(verdict, None, sub_results.to_vec(), name)
    }
}

/// Group `.in` files under `root` by content hash; return only the sets with more than one
/// member. Stands in for the original's MD5 digest (any strong content hash serves the same
/// deduplication purpose); grounded in the teacher's use of `blake3` for content-addressing in
/// `task-maker-store`.
fn duplicate_input_groups(root: &TestCaseGroup) -> Vec<(blake3::Hash, Vec<String>)> {
    use itertools::Itertools;

    root.all_infiles()
        .into_iter()
        .filter_map(|(path, name)| Some((blake3::hash(&std::fs::read(path).ok()?), name.to_string())))
        .into_group_map()
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .sorted_by_key(|(hash, _)| *hash.as_bytes())
        .collect()
}

fn item_sort_key(item: &Item) -> String {
    match item {
        Item::Case(c) => c.name.clone(),
        Item::Group(g) => g.name.clone(),
    }
}

fn load_group_config(datadir: &Path, parent: Option<&GroupConfig>) -> Result<(GroupConfig, Vec<String>, bool)> {
    let configfile = datadir.join("testdata.yaml");
    let mut config = parent.cloned().unwrap_or_default();
    let mut unknown_keys = vec![];
    let mut invalid_grading = false;

    if configfile.is_file() {
        let raw = std::fs::read_to_string(&configfile)
            .with_context(|| format!("failed to read {:?}", configfile))?;
        let data: BTreeMap<String, Value> = serde_yaml::from_str(&raw).unwrap_or_default();

        for (key, value) in &data {
            if !KNOWN_GROUP_KEYS.contains(&key.as_str()) {
                unknown_keys.push(key.clone());
            }
            match key.as_str() {
                "grading" => {
                    if let Some(s) = value.as_str() {
                        invalid_grading = s != "default" && s != "custom";
                        config.grading = s.to_string();
                    }
                }
                "grader_flags" => config.grader_flags = split_flags(value),
                "input_validator_flags" => config.input_validator_flags = split_flags(value),
                "output_validator_flags" => config.output_validator_flags = split_flags(value),
                _ => {}
            }
        }
    }

    Ok((config, unknown_keys, invalid_grading))
}

fn split_flags(value: &Value) -> Vec<String> {
    value
        .as_str()
        .map(|s| shell_words::split(s).unwrap_or_default())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(path: &Path, contents: &[u8]) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(contents).unwrap();
    }

    #[test]
    fn discovers_and_pairs_in_ans_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("secret/01.in"), b"1 2\n");
        write_file(&dir.path().join("secret/01.ans"), b"3\n");
        let root = TestCaseGroup::discover(dir.path(), None, String::new()).unwrap();
        let Item::Group(secret) = &root.items[0] else { panic!() };
        assert_eq!(secret.items.len(), 1);
    }

    #[test]
    fn unmatched_answer_file_is_tracked() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("secret/01.ans"), b"3\n");
        let root = TestCaseGroup::discover(dir.path(), None, String::new()).unwrap();
        let Item::Group(secret) = &root.items[0] else { panic!() };
        assert_eq!(secret.unmatched_ans.len(), 1);
        assert_eq!(secret.items.len(), 0);
    }

    #[test]
    fn missing_secret_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("sample/01.in"), b"1\n");
        write_file(&dir.path().join("sample/01.ans"), b"1\n");
        let root = TestCaseGroup::discover(dir.path(), None, String::new()).unwrap();
        let ctx = CheckContext {
            input_validators: &dummy_validators(),
            output_limit_mib: 8,
        };
        let reporter = Reporter::new();
        assert!(!root.check(&ctx, &reporter, true));
        assert!(reporter.errors() > 0);
    }

    #[test]
    fn missing_sample_is_warning_only() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("secret/01.in"), b"1\n");
        write_file(&dir.path().join("secret/01.ans"), b"1\n");
        let root = TestCaseGroup::discover(dir.path(), None, String::new()).unwrap();
        let ctx = CheckContext {
            input_validators: &dummy_validators(),
            output_limit_mib: 8,
        };
        let reporter = Reporter::new();
        assert!(root.check(&ctx, &reporter, true));
        assert!(reporter.warnings() > 0);
    }

    #[test]
    fn duplicate_inputs_produce_one_warning_per_set() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("secret/01.in"), b"same\n");
        write_file(&dir.path().join("secret/01.ans"), b"1\n");
        write_file(&dir.path().join("secret/02.in"), b"same\n");
        write_file(&dir.path().join("secret/02.ans"), b"2\n");
        write_file(&dir.path().join("sample/01.in"), b"3\n");
        write_file(&dir.path().join("sample/01.ans"), b"3\n");
        let root = TestCaseGroup::discover(dir.path(), None, String::new()).unwrap();
        let dups = duplicate_input_groups(&root);
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].1.len(), 2);
    }

    #[test]
    fn unknown_grading_value_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("secret/testdata.yaml"), b"grading: bogus\n");
        write_file(&dir.path().join("secret/01.in"), b"1\n");
        write_file(&dir.path().join("secret/01.ans"), b"1\n");
        let root = TestCaseGroup::discover(dir.path(), None, String::new()).unwrap();
        let ctx = CheckContext {
            input_validators: &dummy_validators(),
            output_limit_mib: 8,
        };
        let reporter = Reporter::new();
        assert!(!root.check(&ctx, &reporter, true));
    }

    /// A submission whose runtime (~1.6s) falls strictly between `timelim_low` (1s) and
    /// `timelim_high` (2s) must come back TLE at the low limit and AC at the high one, computed
    /// from the single high-limit execution rather than by running twice.
    #[test]
    fn dual_limit_run_detects_time_limit_sensitivity() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("01.in"), b"42\n");
        write_file(&dir.path().join("01.ans"), b"42\n");
        let case = TestCase {
            infile: dir.path().join("01.in"),
            ansfile: dir.path().join("01.ans"),
            name: "01".to_string(),
        };

        write_file(&dir.path().join("ok.sh"), b"#!/bin/sh\nsleep 1.6\ncat\n");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(dir.path().join("ok.sh"), std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        let mut submission = Program::new(dir.path().join("ok.sh"), dir.path()).unwrap();
        submission.compile().unwrap();

        let validation = Validation {
            validation_type: "default".to_string(),
            params: vec![],
        };
        let grading = GradingConfig {
            on_reject: "first_error".to_string(),
            accept_score: None,
            reject_score: None,
            objective: "max".to_string(),
            custom_scoring: false,
        };
        let output_validators = OutputValidators::new(dir.path(), &validation).unwrap();
        let graders = Graders::new(dir.path(), dir.path()).unwrap();
        let reporter = Reporter::new();
        let ctx = RunContext {
            output_validators: &output_validators,
            graders: &graders,
            grading: &grading,
            problem_type: "pass-fail",
            validation: &validation,
            global_validator_flags: &[],
            work_dir: dir.path(),
            reporter: &reporter,
        };

        let (res1, res2) = case.run_submission(&submission, 1.0, 2.0, &GroupConfig::default(), &ctx);

        assert_eq!(res1.verdict, Verdict::TLE);
        assert_eq!(res2.verdict, Verdict::AC);
    }

    fn dummy_validators() -> InputFormatValidators {
        let dir = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        // Leaked on purpose: the tempdirs must outlive the validators instance in these tests,
        // and tests are short-lived processes.
        let dir = Box::leak(Box::new(dir));
        let work = Box::leak(Box::new(work));
        InputFormatValidators::new(dir.path(), work.path()).unwrap()
    }
}
