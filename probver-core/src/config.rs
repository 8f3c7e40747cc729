//! Loading, normalization and validation of `problem.yaml`.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use probver_diagnostics::Reporter;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use thiserror::Error;

/// The closed set of known licenses, lowercase.
const VALID_LICENSES: &[&str] = &[
    "unknown",
    "public domain",
    "cc0",
    "cc by",
    "cc by-sa",
    "educational",
    "permission",
];

const VALID_ON_REJECT: &[&str] = &["first_error", "worst_error", "grade"];
const VALID_CUSTOM_PARAMS: &[&str] = &["score", "interactive"];

/// A structured validation failure a caller can match on, as opposed to a free-form diagnostic
/// reported through the [`Reporter`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A mandatory field (currently only `name`) is missing from `problem.yaml`.
    #[error("mandatory field {0:?} is missing")]
    MissingMandatoryField(&'static str),
    /// `problem.yaml` could not be parsed as YAML.
    #[error("failed to parse problem.yaml: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),
}

/// The parsed `validation` string, split into its type and parameter set.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Validation {
    /// `default` or `custom`.
    pub validation_type: String,
    /// The params following `custom`, e.g. `["score", "interactive"]`. Always empty for
    /// `default`.
    pub params: Vec<String>,
}

impl Validation {
    fn parse(raw: &str) -> Validation {
        let mut parts = raw.split_whitespace();
        let validation_type = parts.next().unwrap_or("default").to_string();
        let params = parts.map(|s| s.to_string()).collect();
        Validation {
            validation_type,
            params,
        }
    }

    /// Whether `interactive` was requested.
    pub fn is_interactive(&self) -> bool {
        self.params.iter().any(|p| p == "interactive")
    }

    /// Whether `score` was requested (custom scoring, as opposed to `accept_score`/`reject_score`
    /// flat defaults).
    pub fn is_custom_scoring(&self) -> bool {
        self.params.iter().any(|p| p == "score")
    }
}

/// Grading-related, derived config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingConfig {
    /// `first_error`, `worst_error` (unsupported) or `grade`.
    pub on_reject: String,
    /// Score assigned on AC when no grader/custom scoring overrides it.
    pub accept_score: Option<f64>,
    /// Score assigned on non-AC/WA when no grader overrides it.
    pub reject_score: Option<f64>,
    /// `max` or `min`.
    pub objective: String,
    /// True iff `validation` params include `score`.
    pub custom_scoring: bool,
}

/// Resource limits, merged from the `limits` mapping.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Limits {
    /// Multiplier applied to the slowest AC runtime to compute the time limit.
    pub time_multiplier: f64,
    /// Multiplier applied on top of `time_multiplier`'s result for the safety-margin limit.
    pub time_safety_margin: f64,
    /// Memory limit, in MiB.
    pub memory: u64,
    /// Output size limit, in MiB.
    pub output: u64,
    /// Compilation wall time limit, in seconds.
    pub compilation_time: u64,
    /// Validator wall time limit, in seconds.
    pub validation_time: u64,
    /// Validator memory limit, in MiB.
    pub validation_memory: u64,
    /// Validator output size limit, in MiB.
    pub validation_output: u64,
    /// The time limit, in seconds. Starts at `time_for_AC_submissions` (default 300) and is
    /// overwritten once `Submissions::check` calibrates it from the accepted submissions.
    pub time: f64,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            time_multiplier: 5.0,
            time_safety_margin: 2.0,
            memory: 1024,
            output: 8,
            compilation_time: 60,
            validation_time: 60,
            validation_memory: 1024,
            validation_output: 8,
            time: 300.0,
        }
    }
}

/// The normalized, frozen view of `problem.yaml`, produced once `check()` has succeeded. Every
/// field here is exactly what the rest of the pipeline is allowed to read; nothing reaches into
/// the raw YAML map after this point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedConfig {
    /// Per-language problem name, keyed by locale (`""` is the default locale).
    pub name: BTreeMap<String, String>,
    /// Machine-readable identifier.
    pub uuid: String,
    /// `pass-fail` or `scoring`.
    pub problem_type: String,
    pub author: String,
    pub source: String,
    pub source_url: String,
    pub keywords: String,
    /// Lowercased license string.
    pub license: String,
    pub rights_owner: String,
    pub limits: Limits,
    pub validation: Validation,
    pub validator_flags: Vec<String>,
    pub grading: GradingConfig,
}

/// Loads, normalizes and validates `problem.yaml`.
#[derive(Debug)]
pub struct ProblemConfig {
    /// The merged (defaults + user overrides) mapping, prior to validation.
    data: BTreeMap<String, Value>,
    /// The subset of keys the user file actually set, for "unknown field" diagnostics.
    orig_keys: Vec<String>,
    normalized: Option<NormalizedConfig>,
    check_state: probver_diagnostics::CheckState,
}

const MANDATORY: &[&str] = &["name"];
const OPTIONAL: &[&str] = &[
    "uuid",
    "type",
    "author",
    "source",
    "source_url",
    "keywords",
    "license",
    "rights_owner",
    "limits",
    "validation",
    "validator_flags",
    "grading",
    "libraries",
    "languages",
];

impl ProblemConfig {
    /// Load `problem.yaml` from `problemdir`.
    pub fn load(problemdir: &Path) -> Result<ProblemConfig> {
        let path = problemdir.join("problem.yaml");
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {:?}", path))?;
        let user: BTreeMap<String, Value> =
            serde_yaml::from_str(&raw).map_err(ConfigError::InvalidYaml)?;
        let orig_keys = user.keys().cloned().collect();

        let mut data = BTreeMap::new();
        data.insert("uuid".to_string(), Value::String(String::new()));
        data.insert("type".to_string(), Value::String("pass-fail".to_string()));
        for key in ["author", "source", "source_url", "keywords"] {
            data.insert(key.to_string(), Value::String(String::new()));
        }
        data.insert("license".to_string(), Value::String("unknown".to_string()));
        data.insert("rights_owner".to_string(), Value::String(String::new()));
        data.insert("validation".to_string(), Value::String("default".to_string()));
        data.insert("validator_flags".to_string(), Value::String(String::new()));

        for (key, value) in user {
            data.insert(key, value);
        }

        // Normalization quirk: a plain string `name` is wrapped as a per-language map with a
        // blank default locale.
        if let Some(Value::String(name)) = data.get("name").cloned() {
            let mut map = serde_yaml::Mapping::new();
            map.insert(Value::String(String::new()), Value::String(name));
            data.insert("name".to_string(), Value::Mapping(map));
        }

        // Patch rights_owner from author, then source, when unset and the license isn't public
        // domain.
        let license_is_public_domain = data
            .get("license")
            .and_then(Value::as_str)
            .map(|s| s.eq_ignore_ascii_case("public domain"))
            .unwrap_or(false);
        let rights_owner_unset = data
            .get("rights_owner")
            .and_then(Value::as_str)
            .map(str::is_empty)
            .unwrap_or(true);
        if rights_owner_unset && !license_is_public_domain {
            let fallback = data
                .get("author")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .or_else(|| {
                    data.get("source")
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                })
                .map(str::to_string);
            if let Some(fallback) = fallback {
                data.insert("rights_owner".to_string(), Value::String(fallback));
            }
        }

        if let Some(license) = data.get("license").and_then(Value::as_str) {
            data.insert(
                "license".to_string(),
                Value::String(license.to_lowercase()),
            );
        }

        Ok(ProblemConfig {
            data,
            orig_keys,
            normalized: None,
            check_state: probver_diagnostics::CheckState::Unchecked,
        })
    }

    /// Get a raw value by key, or `None` if absent. Mirrors the dynamic-mapping-over-config
    /// design: the raw data is queryable even before `check()` runs.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Validate the configuration, reporting errors/warnings through `reporter`. Returns the
    /// memoized outcome; the first call computes it, later calls are free.
    pub fn check(&mut self, reporter: &Reporter) -> bool {
        if self.check_state.is_checked() {
            return self.check_state.as_bool();
        }
        let reporter = reporter.for_aspect("config");
        let mut ok = true;

        for field in MANDATORY {
            if !self.orig_keys.iter().any(|k| k == field) {
                reporter.error(format!("mandatory field {:?} missing", field));
                ok = false;
            }
        }
        for field in &self.orig_keys {
            if !MANDATORY.contains(&field.as_str()) && !OPTIONAL.contains(&field.as_str()) {
                reporter.warning(format!("unknown field {:?}", field));
            }
        }
        for field in &self.orig_keys {
            if let Some(Value::String(s)) = self.data.get(field) {
                if s.is_empty() && MANDATORY.contains(&field.as_str()) {
                    reporter.error(format!("field {:?} is empty", field));
                    ok = false;
                }
            }
        }

        let problem_type = self
            .data
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("pass-fail")
            .to_string();
        if problem_type != "pass-fail" && problem_type != "scoring" {
            reporter.error(format!("invalid type {:?}", problem_type));
            ok = false;
        }

        let license = self
            .data
            .get("license")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let rights_owner = self
            .data
            .get("rights_owner")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        if !VALID_LICENSES.contains(&license.as_str()) {
            reporter.error(format!("invalid license {:?}", license));
            ok = false;
        } else if license == "unknown" {
            reporter.warning("license is unknown");
        } else if license == "public domain" {
            if !rights_owner.is_empty() {
                reporter.error(
                    "Can not have a rights_owner for a problem in public domain",
                );
                ok = false;
            }
        } else if rights_owner.is_empty() {
            reporter.error(format!("license {:?} requires a rights_owner", license));
            ok = false;
        }

        let source = self
            .data
            .get("source")
            .and_then(Value::as_str)
            .unwrap_or("");
        let source_url = self
            .data
            .get("source_url")
            .and_then(Value::as_str)
            .unwrap_or("");
        if !source_url.is_empty() && source.is_empty() {
            reporter.error("source_url requires source");
            ok = false;
        }

        if self.orig_keys.iter().any(|k| k == "libraries") {
            reporter.error("libraries is not supported");
            ok = false;
        }
        if self.orig_keys.iter().any(|k| k == "languages") {
            reporter.error("languages is not supported");
            ok = false;
        }

        let validation_raw = self
            .data
            .get("validation")
            .and_then(Value::as_str)
            .unwrap_or("default")
            .to_string();
        let validation = Validation::parse(&validation_raw);
        if validation.validation_type != "default" && validation.validation_type != "custom" {
            reporter.error(format!(
                "invalid validation type {:?}",
                validation.validation_type
            ));
            ok = false;
        }
        if validation.validation_type == "default" && !validation.params.is_empty() {
            reporter.error("default validation takes no params");
            ok = false;
        }
        for param in &validation.params {
            if !VALID_CUSTOM_PARAMS.contains(&param.as_str()) {
                reporter.error(format!("unknown validation param {:?}", param));
                ok = false;
            }
        }

        let grading_map = self
            .data
            .get("grading")
            .and_then(Value::as_mapping)
            .cloned()
            .unwrap_or_default();
        let on_reject = grading_map
            .get(Value::String("on_reject".to_string()))
            .and_then(Value::as_str)
            .unwrap_or("first_error")
            .to_string();
        if !VALID_ON_REJECT.contains(&on_reject.as_str()) {
            reporter.error(format!("invalid grading.on_reject {:?}", on_reject));
            ok = false;
        }
        if on_reject == "grade" && problem_type == "pass-fail" {
            reporter.error("grading.on_reject=grade is forbidden for pass-fail problems");
            ok = false;
        }
        if on_reject == "worst_error" {
            reporter.error("grading.on_reject=worst_error is not currently supported");
            ok = false;
        }

        let custom_scoring = validation.is_custom_scoring();
        let (accept_score, reject_score) = if problem_type == "pass-fail" {
            (None, None)
        } else {
            (
                grading_map
                    .get(Value::String("accept_score".to_string()))
                    .and_then(value_as_f64)
                    .or(Some(1.0)),
                grading_map
                    .get(Value::String("reject_score".to_string()))
                    .and_then(value_as_f64)
                    .or(Some(0.0)),
            )
        };
        let objective = grading_map
            .get(Value::String("objective".to_string()))
            .and_then(Value::as_str)
            .unwrap_or("max")
            .to_string();

        let limits_map = self
            .data
            .get("limits")
            .and_then(Value::as_mapping)
            .cloned()
            .unwrap_or_default();
        let mut limits = Limits::default();
        if let Some(v) = limits_map
            .get(Value::String("time_multiplier".to_string()))
            .and_then(value_as_f64)
        {
            limits.time_multiplier = v;
        }
        if let Some(v) = limits_map
            .get(Value::String("time_safety_margin".to_string()))
            .and_then(value_as_f64)
        {
            limits.time_safety_margin = v;
        }
        if let Some(v) = limits_map
            .get(Value::String("time_for_AC_submissions".to_string()))
            .and_then(value_as_f64)
        {
            limits.time = v;
        }

        let name = self
            .data
            .get("name")
            .and_then(Value::as_mapping)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| {
                        Some((k.as_str()?.to_string(), v.as_str()?.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let validator_flags = shell_words::split(
            self.data
                .get("validator_flags")
                .and_then(Value::as_str)
                .unwrap_or(""),
        )
        .unwrap_or_default();

        self.normalized = Some(NormalizedConfig {
            name,
            uuid: self
                .data
                .get("uuid")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            problem_type,
            author: self
                .data
                .get("author")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            source: source.to_string(),
            source_url: source_url.to_string(),
            keywords: self
                .data
                .get("keywords")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            license,
            rights_owner,
            limits,
            validation,
            validator_flags,
            grading: GradingConfig {
                on_reject,
                accept_score,
                reject_score,
                objective,
                custom_scoring,
            },
        });

        self.check_state = if ok {
            probver_diagnostics::CheckState::Ok
        } else {
            probver_diagnostics::CheckState::Failed
        };
        ok
    }

    /// Compute the normalized view directly from the defaults-merged raw data, without
    /// validating anything or touching the memoized `check()` state.
    ///
    /// `Problem::load` uses this to read configuration (the validation type, the output limit,
    /// ...) while wiring up later components, since those need a value *before* `check()` is
    /// ever invoked on the "config" aspect — exactly the "dynamic mapping over config" design:
    /// the raw, defaults-merged view is queryable independent of validation.
    pub fn preview(&self) -> NormalizedConfig {
        let problem_type = self
            .data
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("pass-fail")
            .to_string();
        let license = self
            .data
            .get("license")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let rights_owner = self
            .data
            .get("rights_owner")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let source = self
            .data
            .get("source")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let source_url = self
            .data
            .get("source_url")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let validation_raw = self
            .data
            .get("validation")
            .and_then(Value::as_str)
            .unwrap_or("default")
            .to_string();
        let validation = Validation::parse(&validation_raw);

        let grading_map = self
            .data
            .get("grading")
            .and_then(Value::as_mapping)
            .cloned()
            .unwrap_or_default();
        let on_reject = grading_map
            .get(Value::String("on_reject".to_string()))
            .and_then(Value::as_str)
            .unwrap_or("first_error")
            .to_string();
        let custom_scoring = validation.is_custom_scoring();
        let (accept_score, reject_score) = if problem_type == "pass-fail" {
            (None, None)
        } else {
            (
                grading_map
                    .get(Value::String("accept_score".to_string()))
                    .and_then(value_as_f64)
                    .or(Some(1.0)),
                grading_map
                    .get(Value::String("reject_score".to_string()))
                    .and_then(value_as_f64)
                    .or(Some(0.0)),
            )
        };
        let objective = grading_map
            .get(Value::String("objective".to_string()))
            .and_then(Value::as_str)
            .unwrap_or("max")
            .to_string();

        let limits_map = self
            .data
            .get("limits")
            .and_then(Value::as_mapping)
            .cloned()
            .unwrap_or_default();
        let mut limits = Limits::default();
        if let Some(v) = limits_map
            .get(Value::String("time_multiplier".to_string()))
            .and_then(value_as_f64)
        {
            limits.time_multiplier = v;
        }
        if let Some(v) = limits_map
            .get(Value::String("time_safety_margin".to_string()))
            .and_then(value_as_f64)
        {
            limits.time_safety_margin = v;
        }
        if let Some(v) = limits_map
            .get(Value::String("time_for_AC_submissions".to_string()))
            .and_then(value_as_f64)
        {
            limits.time = v;
        }

        let name = self
            .data
            .get("name")
            .and_then(Value::as_mapping)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_str()?.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let validator_flags = shell_words::split(
            self.data
                .get("validator_flags")
                .and_then(Value::as_str)
                .unwrap_or(""),
        )
        .unwrap_or_default();

        NormalizedConfig {
            name,
            uuid: self
                .data
                .get("uuid")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            problem_type,
            author: self
                .data
                .get("author")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            source,
            source_url,
            keywords: self
                .data
                .get("keywords")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            license,
            rights_owner,
            limits,
            validation,
            validator_flags,
            grading: GradingConfig {
                on_reject,
                accept_score,
                reject_score,
                objective,
                custom_scoring,
            },
        }
    }

    /// The normalized view computed by `check()`. Panics if `check()` has not been called yet.
    pub fn normalized(&self) -> &NormalizedConfig {
        self.normalized
            .as_ref()
            .expect("ProblemConfig::check must run before normalized() is read")
    }

    /// Persist the `limits` calibrated by `Submissions::check` (`spec.md` §4.9: `limits.time` is
    /// "written back into `config.limits.time`") into the normalized config, so later readers of
    /// `normalized()`/`config()` see the calibrated time limit rather than the pre-calibration
    /// default. Panics if `check()` has not been called yet.
    pub fn set_calibrated_limits(&mut self, limits: Limits) {
        self.normalized
            .as_mut()
            .expect("ProblemConfig::check must run before set_calibrated_limits()")
            .limits = limits;
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    value.as_f64().or_else(|| value.as_i64().map(|v| v as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_problem_yaml(dir: &Path, contents: &str) {
        let mut f = std::fs::File::create(dir.join("problem.yaml")).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn minimal_config_passes() {
        let dir = tempfile::tempdir().unwrap();
        write_problem_yaml(dir.path(), "name: Test Problem\n");
        let mut config = ProblemConfig::load(dir.path()).unwrap();
        let reporter = Reporter::new();
        assert!(config.check(&reporter));
        assert_eq!(reporter.errors(), 0);
        assert_eq!(config.normalized().problem_type, "pass-fail");
    }

    #[test]
    fn missing_name_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_problem_yaml(dir.path(), "source: somewhere\n");
        let mut config = ProblemConfig::load(dir.path()).unwrap();
        let reporter = Reporter::new();
        assert!(!config.check(&reporter));
        assert!(reporter.errors() > 0);
    }

    #[test]
    fn public_domain_with_rights_owner_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_problem_yaml(
            dir.path(),
            "name: Test\nlicense: public domain\nrights_owner: Alice\n",
        );
        let mut config = ProblemConfig::load(dir.path()).unwrap();
        let reporter = Reporter::new();
        assert!(!config.check(&reporter));
    }

    #[test]
    fn check_is_memoized() {
        let dir = tempfile::tempdir().unwrap();
        write_problem_yaml(dir.path(), "name: Test\n");
        let mut config = ProblemConfig::load(dir.path()).unwrap();
        let reporter = Reporter::new();
        assert!(config.check(&reporter));
        reporter.reset();
        assert!(config.check(&reporter));
        assert_eq!(reporter.errors(), 0);
    }
}
