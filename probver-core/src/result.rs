//! The immutable verdict record every validation step produces, and its aggregation rules.

use serde::{Deserialize, Serialize};

/// The outcome of running a submission (or a grader, or a validator-derived judgement) against
/// some piece of test data.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Verdict {
    /// Judge error: a helper program crashed or produced malformed output.
    JE,
    /// Compile error.
    CE,
    /// Time limit exceeded.
    TLE,
    /// Run-time error.
    RTE,
    /// Wrong answer.
    WA,
    /// Accepted.
    AC,
}

impl Verdict {
    /// Human readable name, as used in log messages and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::JE => "JE",
            Verdict::CE => "CE",
            Verdict::TLE => "TLE",
            Verdict::RTE => "RTE",
            Verdict::WA => "WA",
            Verdict::AC => "AC",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Verdict {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "JE" => Ok(Verdict::JE),
            "CE" => Ok(Verdict::CE),
            "TLE" => Ok(Verdict::TLE),
            "RTE" => Ok(Verdict::RTE),
            "WA" => Ok(Verdict::WA),
            "AC" => Ok(Verdict::AC),
            other => anyhow::bail!("unknown verdict {:?}", other),
        }
    }
}

/// A node in the result tree: either a leaf case's own outcome or an aggregate over children.
/// Whoever contributed the attributed value (the worst runtime, the deciding verdict) is kept
/// alongside it as a human-readable witness, so a report can point at the actual offending case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionResult {
    /// The verdict of this (sub)result.
    pub verdict: Verdict,
    /// The score, when the problem uses scoring; `None` for pass-fail problems or before a
    /// grader has run.
    pub score: Option<f64>,
    /// The children this result was aggregated from, in encounter order. Empty for a leaf.
    pub subresults: Vec<SubmissionResult>,
    /// Which test case (or group) is responsible for this verdict, e.g. "secret/03".
    pub reason: String,
    /// The maximum runtime, in seconds, over this result and all its children.
    pub runtime: f64,
    /// The name of the case that produced `runtime`.
    pub runtime_reason: String,
    /// The maximum runtime over this result and all AC children (and this result itself, if
    /// AC). `None` if no AC witness exists anywhere in the subtree.
    pub ac_runtime: Option<f64>,
    /// The name of the case that produced `ac_runtime`.
    pub ac_runtime_reason: Option<String>,
}

impl SubmissionResult {
    /// Build a leaf result: a single test case's own outcome, with no children.
    pub fn leaf(verdict: Verdict, score: Option<f64>, reason: impl Into<String>, runtime: f64) -> Self {
        let reason = reason.into();
        let ac = verdict == Verdict::AC;
        Self {
            verdict,
            score,
            subresults: vec![],
            runtime,
            runtime_reason: reason.clone(),
            ac_runtime: ac.then_some(runtime),
            ac_runtime_reason: ac.then(|| reason.clone()),
            reason,
        }
    }

    /// Build an aggregate result over `subresults`. `runtime`/`ac_runtime` (and their witnesses)
    /// are derived as the maximum over the children, never recomputed from scratch by the
    /// caller.
    pub fn aggregate(
        verdict: Verdict,
        score: Option<f64>,
        subresults: Vec<SubmissionResult>,
        reason: impl Into<String>,
    ) -> Self {
        let (runtime, runtime_reason) = subresults
            .iter()
            .map(|r| (r.runtime, r.runtime_reason.clone()))
            .fold((0.0, String::new()), |acc, cur| {
                if cur.0 > acc.0 {
                    cur
                } else {
                    acc
                }
            });
        let (ac_runtime, ac_runtime_reason) = subresults
            .iter()
            .filter_map(|r| r.ac_runtime.map(|rt| (rt, r.ac_runtime_reason.clone().unwrap())))
            .fold((None, None), |acc: (Option<f64>, Option<String>), cur| {
                match acc.0 {
                    Some(best) if best >= cur.0 => acc,
                    _ => (Some(cur.0), Some(cur.1)),
                }
            });
        Self {
            verdict,
            score,
            subresults,
            reason: reason.into(),
            runtime,
            runtime_reason,
            ac_runtime,
            ac_runtime_reason,
        }
    }
}

/// How a `TestCaseGroup` reduces its children's verdicts into a group verdict.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum OnReject {
    /// The group's verdict is the first non-AC child's verdict, in encounter order.
    FirstError,
    /// The group's verdict is the worst child verdict under the fixed severity ordering
    /// `JE < CE < TLE < RTE < WA < AC`. Rejected at config-check time (see `ProblemConfig`), but
    /// the reducer itself is implemented and exercised directly by tests.
    WorstError,
    /// Delegate to a grader regardless of whether any child failed.
    Grade,
}

/// Reduce a (non-empty) vector of per-case results into a single verdict, without touching score
/// or runtime bookkeeping (that is the caller's job via [`SubmissionResult::aggregate`]).
pub fn reduce_verdict(subresults: &[SubmissionResult], on_reject: OnReject) -> Verdict {
    match on_reject {
        OnReject::FirstError | OnReject::Grade => subresults
            .iter()
            .find(|r| r.verdict != Verdict::AC)
            .map(|r| r.verdict)
            .unwrap_or(Verdict::AC),
        OnReject::WorstError => subresults
            .iter()
            .map(|r| r.verdict)
            .min()
            .unwrap_or(Verdict::AC),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn leaf_ac_has_ac_runtime() {
        let r = SubmissionResult::leaf(Verdict::AC, Some(1.0), "secret/01", 0.5);
        assert_eq!(r.ac_runtime, Some(0.5));
        assert_eq!(r.ac_runtime_reason.as_deref(), Some("secret/01"));
    }

    #[test]
    fn leaf_non_ac_has_no_ac_runtime() {
        let r = SubmissionResult::leaf(Verdict::WA, None, "secret/01", 0.5);
        assert_eq!(r.ac_runtime, None);
    }

    #[test]
    fn aggregate_runtime_is_max_of_children() {
        let a = SubmissionResult::leaf(Verdict::AC, None, "secret/01", 0.1);
        let b = SubmissionResult::leaf(Verdict::AC, None, "secret/02", 0.9);
        let agg = SubmissionResult::aggregate(Verdict::AC, None, vec![a, b], "secret");
        assert_eq!(agg.runtime, 0.9);
        assert_eq!(agg.runtime_reason, "secret/02");
        assert_eq!(agg.ac_runtime, Some(0.9));
    }

    #[test]
    fn first_error_short_circuit_verdict() {
        let a = SubmissionResult::leaf(Verdict::AC, None, "s1", 0.1);
        let b = SubmissionResult::leaf(Verdict::WA, None, "s2", 0.1);
        let c = SubmissionResult::leaf(Verdict::TLE, None, "s3", 0.1);
        let v = reduce_verdict(&[a, b, c], OnReject::FirstError);
        assert_eq!(v, Verdict::WA);
    }

    #[test]
    fn worst_error_picks_worst_under_fixed_ordering() {
        let a = SubmissionResult::leaf(Verdict::WA, None, "s1", 0.1);
        let b = SubmissionResult::leaf(Verdict::TLE, None, "s2", 0.1);
        let v = reduce_verdict(&[a, b], OnReject::WorstError);
        assert_eq!(v, Verdict::TLE);
    }

    #[test]
    fn compute_result_is_idempotent() {
        let subs = vec![
            SubmissionResult::leaf(Verdict::AC, None, "s1", 0.2),
            SubmissionResult::leaf(Verdict::AC, None, "s2", 0.4),
        ];
        let v1 = reduce_verdict(&subs, OnReject::FirstError);
        let v2 = reduce_verdict(&subs, OnReject::FirstError);
        assert_eq!(v1, v2);
        let agg1 = SubmissionResult::aggregate(v1, None, subs.clone(), "group");
        let agg2 = SubmissionResult::aggregate(v2, None, subs, "group");
        assert_eq!(agg1.runtime, agg2.runtime);
        assert_eq!(agg1.verdict, agg2.verdict);
    }
}
