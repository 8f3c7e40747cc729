//! End-to-end scenarios driving `Problem::load`/`check` against on-disk problem packages built
//! in a tempdir, one per test. Each corresponds to a scenario seed from the engine's
//! specification (S1, S3, S4, S7 below; S2/S5/S6/S8 are covered at the unit level next to the
//! component they exercise — `testdata.rs`, `config.rs`, `output_validators.rs`).

use std::path::Path;

use probver_core::{Noop, Problem};

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

fn write_executable_shell(path: &Path, body: &str) {
    write_file(path, &format!("#!/bin/sh\n{}\n", body));
}

/// S1 — a minimal pass-fail problem with one AC submission and the built-in default validator.
#[test]
fn s1_minimal_ac_problem_has_no_errors_and_calibrates_time_limit() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("sumitup");
    std::fs::create_dir_all(&root).unwrap();

    write_file(&root.join("problem.yaml"), "name: Sum It Up\n");
    write_file(&root.join("problem_statement/problem.tex"), "\\problemname{Sum It Up}\n");

    write_file(&root.join("data/sample/01.in"), "");
    write_file(&root.join("data/sample/01.ans"), "");
    write_file(&root.join("data/secret/01.in"), "");
    write_file(&root.join("data/secret/01.ans"), "");

    write_executable_shell(&root.join("input_format_validators/validate.sh"), "exit 42");
    write_executable_shell(&root.join("submissions/accepted/ok.sh"), "exit 0");

    let mut problem = Problem::load(&root).unwrap();
    let reporter = problem.check(&[], false, &Noop);

    assert_eq!(reporter.errors(), 0, "diagnostics: {:?}", reporter.diagnostics());
    // `ok.sh` exits instantly, so the calibrated limit should collapse to the `max(1, ...)` floor,
    // nowhere near the uncalibrated 300s default — proves `submissions.check`'s result actually
    // gets written back into `config()`, not just computed and discarded.
    assert_eq!(problem.config().normalized().limits.time, 1.0);
}

/// S3 — an input validator that accepts the random 200-byte sanity input is over-permissive;
/// expect exactly one warning (one distinct flag set is exercised: the default, empty, flags).
#[test]
fn s3_over_permissive_validator_warns_once() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("problem");
    std::fs::create_dir_all(&root).unwrap();

    write_file(&root.join("problem.yaml"), "name: Accepts Everything\n");
    write_file(&root.join("problem_statement/problem.tex"), "\\problemname{Accepts Everything}\n");
    write_file(&root.join("data/sample/01.in"), "1\n");
    write_file(&root.join("data/sample/01.ans"), "1\n");
    write_file(&root.join("data/secret/01.in"), "1\n");
    write_file(&root.join("data/secret/01.ans"), "1\n");
    write_executable_shell(&root.join("input_format_validators/validate.sh"), "exit 42");
    write_executable_shell(&root.join("submissions/accepted/ok.sh"), "cat");

    let mut problem = Problem::load(&root).unwrap();
    let reporter = problem.check(&["testdata"], false, &Noop);

    let over_permissive_warnings = reporter
        .diagnostics()
        .into_iter()
        .filter(|d| d.message().contains("over-permissive"))
        .count();
    assert_eq!(over_permissive_warnings, 1);
}

/// S4 — an output validator that exits with an unrecognized code produces a judge error, which
/// propagates into the submission's verdict and reports an error.
#[test]
fn s4_malformed_output_validator_is_judge_error() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("problem");
    std::fs::create_dir_all(&root).unwrap();

    write_file(
        &root.join("problem.yaml"),
        "name: Bad Validator\nvalidation: custom\n",
    );
    write_file(&root.join("problem_statement/problem.tex"), "\\problemname{Bad Validator}\n");
    write_file(&root.join("data/sample/01.in"), "1\n");
    write_file(&root.join("data/sample/01.ans"), "1\n");
    write_file(&root.join("data/secret/01.in"), "1\n");
    write_file(&root.join("data/secret/01.ans"), "1\n");
    write_executable_shell(&root.join("input_format_validators/validate.sh"), "exit 42");
    write_executable_shell(&root.join("output_validators/check.sh"), "exit 7");
    write_executable_shell(&root.join("submissions/accepted/ok.sh"), "cat");

    let mut problem = Problem::load(&root).unwrap();
    let reporter = problem.check(&[], false, &Noop);

    assert!(reporter.errors() > 0, "diagnostics: {:?}", reporter.diagnostics());
    assert!(reporter
        .diagnostics()
        .iter()
        .any(|d| d.message().contains("ok.sh") && d.message().contains("verdict JE")));
}

/// S7 — a scoring problem with a custom grader: two AC cases scoring 0.4 and 0.5, and a grader
/// that overrides the group aggregate to `AC 0.9`. Wired directly (rather than through
/// `Problem::check`, which discards the per-submission result tree after verifying verdicts)
/// since this is the one place the tree's `score` field is worth asserting on.
#[test]
fn s7_scoring_problem_delegates_to_grader() {
    use probver_core::{GradingConfig, Graders, OutputValidators, RunContext, TestCaseGroup, Validation, Verdict};
    use probver_lang::Program;

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("problem");
    std::fs::create_dir_all(&root).unwrap();

    write_file(&root.join("data/secret/01.in"), "1\n");
    write_file(&root.join("data/secret/01.ans"), "1\n");
    write_file(&root.join("data/secret/02.in"), "2\n");
    write_file(&root.join("data/secret/02.ans"), "2\n");
    write_file(&root.join("data/testdata.yaml"), "grading: custom\n");

    // Output validator: always AC, score depends on the input (0.4 for case 1, 0.5 for case 2).
    write_executable_shell(
        &root.join("output_validators/check.sh"),
        r#"
infile="$1"
feedbackdir="$3"
case "$(cat "$infile")" in
  1) echo 0.4 > "$feedbackdir/score.txt" ;;
  2) echo 0.5 > "$feedbackdir/score.txt" ;;
esac
exit 42
"#,
    );
    write_executable_shell(&root.join("graders/grade.sh"), "echo 'AC 0.9'");
    write_executable_shell(&root.join("submissions/accepted/ok.sh"), "cat");

    let validation = Validation {
        validation_type: "custom".to_string(),
        params: vec!["score".to_string()],
    };
    let grading = GradingConfig {
        on_reject: "first_error".to_string(),
        accept_score: Some(1.0),
        reject_score: Some(0.0),
        objective: "max".to_string(),
        custom_scoring: true,
    };

    let mut output_validators = OutputValidators::new(&root, &validation).unwrap();
    let mut graders = Graders::new(&root, &root).unwrap();
    let testdata = TestCaseGroup::discover(&root.join("data"), None, String::new()).unwrap();
    let mut submission = Program::new(root.join("submissions/accepted/ok.sh"), root.clone()).unwrap();
    submission.compile().unwrap();

    let reporter = probver_diagnostics::Reporter::new();
    assert!(output_validators.check(&reporter));
    assert!(graders.check("scoring", &reporter));

    let ctx = RunContext {
        output_validators: &output_validators,
        graders: &graders,
        grading: &grading,
        problem_type: "scoring",
        validation: &validation,
        global_validator_flags: &[],
        work_dir: &root,
        reporter: &reporter,
    };

    let (_res1, res2) = testdata.run_submission(&submission, 300.0, 300.0, &ctx);

    assert_eq!(res2.verdict, Verdict::AC);
    assert_eq!(res2.score, Some(0.9));
}
