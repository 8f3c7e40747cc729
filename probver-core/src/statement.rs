//! Discovery, minimal parsing and external conversion of the problem statement
//! (`problem.<lang>.tex`).

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use probver_diagnostics::{CheckState, Reporter};
use regex::Regex;

lazy_static! {
    static ref PROBLEMNAME_RE: Regex = Regex::new(r"\\problemname\{(?:\\[a-zA-Z]+\{)?([^}]*)\}?").unwrap();
    static ref PLAINNAME_RE: Regex = Regex::new(r"(?m)^%%\s*plainproblemname:\s*(.*)$").unwrap();
}

/// The external PDF/HTML statement converters, modeled as a narrow interface so the rest of the
/// pipeline never shells out directly. `lang` is `""` for the default-locale statement.
pub trait ExternalConverter: std::fmt::Debug {
    /// Render `source` (a `problem.<lang>.tex` path) to PDF. Returns `Ok(())` on success.
    fn convert_pdf(&self, source: &Path, lang: &str) -> Result<(), String>;
    /// Render `source` to HTML. Returns `Ok(())` on success.
    fn convert_html(&self, source: &Path, lang: &str) -> Result<(), String>;
    /// The command a user could run by hand to reproduce a failed conversion, for error messages.
    fn reproducer(&self, tool: &str, lang: &str) -> String {
        if lang.is_empty() {
            tool.to_string()
        } else {
            format!("{} -l {}", tool, lang)
        }
    }
}

/// The converter used when no LaTeX toolchain is available (tests, constrained environments).
/// Plays the same role as the original's `pdfopt.nopdf = True` dry-run mode.
#[derive(Debug, Default)]
pub struct Noop;

impl ExternalConverter for Noop {
    fn convert_pdf(&self, _source: &Path, _lang: &str) -> Result<(), String> {
        Ok(())
    }

    fn convert_html(&self, _source: &Path, _lang: &str) -> Result<(), String> {
        Ok(())
    }
}

/// Shells out to the `problem2pdf`/`problem2html` tools (or whatever is configured in their
/// place) the way the original always does outside of its `nopdf` dry-run mode.
#[derive(Debug)]
pub struct ShellConverter {
    pdf_command: String,
    html_command: String,
}

impl ShellConverter {
    /// Use `problem2pdf`/`problem2html` off `$PATH`.
    pub fn new() -> ShellConverter {
        ShellConverter {
            pdf_command: "problem2pdf".to_string(),
            html_command: "problem2html".to_string(),
        }
    }

    fn run(&self, command: &str, source: &Path, lang: &str) -> Result<(), String> {
        let mut args = shell_words::split(command).map_err(|e| e.to_string())?;
        if args.is_empty() {
            return Err("empty conversion command".to_string());
        }
        let program = args.remove(0);
        if !lang.is_empty() {
            args.push("-l".to_string());
            args.push(lang.to_string());
        }
        let dir = source.parent().unwrap_or_else(|| Path::new("."));
        let status = std::process::Command::new(&program)
            .args(&args)
            .arg(source.file_name().unwrap_or_default())
            .current_dir(dir)
            .status()
            .map_err(|e| format!("failed to run {}: {}", program, e))?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("{} exited with {}", program, status))
        }
    }
}

impl Default for ShellConverter {
    fn default() -> Self {
        ShellConverter::new()
    }
}

impl ExternalConverter for ShellConverter {
    fn convert_pdf(&self, source: &Path, lang: &str) -> Result<(), String> {
        self.run(&self.pdf_command, source, lang)
    }

    fn convert_html(&self, source: &Path, lang: &str) -> Result<(), String> {
        self.run(&self.html_command, source, lang)
    }

    fn reproducer(&self, tool: &str, lang: &str) -> String {
        let command = if tool == "problem2pdf" { &self.pdf_command } else { &self.html_command };
        if lang.is_empty() {
            command.clone()
        } else {
            format!("{} -l {}", command, lang)
        }
    }
}

/// One `problem.<lang>.tex` file discovered under `problem_statement/`.
#[derive(Debug, Clone)]
pub struct StatementFile {
    /// Path to the `.tex` file.
    pub path: PathBuf,
    /// The locale, e.g. `"en"`, or `""` when the file is the bare `problem.tex`.
    pub language: String,
}

/// The problem statement: one or more localized `.tex` files under `problem_statement/`.
#[derive(Debug)]
pub struct ProblemStatement {
    problemdir: PathBuf,
    files: Vec<StatementFile>,
    check_state: CheckState,
}

impl ProblemStatement {
    /// Discover every `problem_statement/problem[.<lang>].tex` file.
    pub fn new(problemdir: &Path) -> ProblemStatement {
        let statement_dir = problemdir.join("problem_statement");
        let mut files = Vec::new();
        if let Some(pattern) = statement_dir.join("problem*.tex").to_str() {
            for entry in glob::glob(pattern).into_iter().flatten().flatten() {
                if let Some(language) = language_of(&entry) {
                    files.push(StatementFile { path: entry, language });
                }
            }
        }
        files.sort_by(|a, b| a.language.cmp(&b.language));
        ProblemStatement {
            problemdir: problemdir.to_path_buf(),
            files,
            check_state: CheckState::Unchecked,
        }
    }

    /// All discovered localized statement files.
    pub fn files(&self) -> &[StatementFile] {
        &self.files
    }

    /// The languages present, e.g. `["en", "sv"]`.
    pub fn languages(&self) -> Vec<String> {
        self.files.iter().map(|f| f.language.clone()).collect()
    }

    /// Extract the problem name declared in a statement file, by looking for `\problemname{...}`
    /// or, failing that, a `%% plainproblemname: ...` comment.
    pub fn get_title(&self, file: &StatementFile) -> Option<String> {
        let body = std::fs::read_to_string(&file.path).ok()?;
        if let Some(caps) = PROBLEMNAME_RE.captures(&body) {
            let name = caps.get(1)?.as_str().trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
        PLAINNAME_RE
            .captures(&body)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    }

    /// `{name: {lang: value}}`, seeding `ProblemConfig`'s name map the same way
    /// `ProblemStatement.get_config()` does, for any statement that declares a title.
    pub fn get_config(&self) -> std::collections::BTreeMap<String, String> {
        self.files
            .iter()
            .filter_map(|f| Some((f.language.clone(), self.get_title(f)?)))
            .collect()
    }

    /// Validate that the statement directory is well formed (at least one file, no ambiguity
    /// between `problem.tex` and `problem.en.tex`), then run every discovered statement through
    /// `converter`'s PDF and HTML conversion.
    pub fn check(&mut self, reporter: &Reporter, converter: &dyn ExternalConverter) -> bool {
        if self.check_state.is_checked() {
            return self.check_state.as_bool();
        }
        let reporter = reporter.for_aspect("problem statement");
        let mut ok = true;

        if self.files.is_empty() {
            reporter.error(format!(
                "no problem statements found (expected problem.tex or problem.<lang>.tex in {:?})",
                self.problemdir.join("problem_statement")
            ));
            ok = false;
        } else {
            let has_bare = self.files.iter().any(|f| f.language.is_empty());
            let has_en = self.files.iter().any(|f| f.language == "en");
            if has_bare && has_en {
                reporter.error("can't supply both problem.tex and problem.en.tex");
                ok = false;
            }

            for file in &self.files {
                if let Err(e) = converter.convert_pdf(&file.path, &file.language) {
                    reporter.error_with_note(
                        format!(
                            "could not compile problem statement for language {:?}: {}",
                            file.language, e
                        ),
                        format!("run `{}` on the problem to diagnose", converter.reproducer("problem2pdf", &file.language)),
                    );
                    continue;
                }
                if let Err(e) = converter.convert_html(&file.path, &file.language) {
                    reporter.error_with_note(
                        format!(
                            "could not convert problem statement to html for language {:?}: {}",
                            file.language, e
                        ),
                        format!("run `{}` on the problem to diagnose", converter.reproducer("problem2html", &file.language)),
                    );
                }
            }
        }

        self.check_state = if ok { CheckState::Ok } else { CheckState::Failed };
        ok
    }
}

fn language_of(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    match stem.strip_prefix("problem") {
        Some(rest) if rest.is_empty() => Some(String::new()),
        Some(rest) => rest.strip_prefix('.').map(str::to_string),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) {
        std::fs::create_dir_all(dir).unwrap();
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn discovers_default_bare_statement() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join("problem_statement"),
            "problem.tex",
            "\\problemname{Sum It Up}\n",
        );
        let mut statement = ProblemStatement::new(dir.path());
        let reporter = Reporter::new();
        assert!(statement.check(&reporter, &Noop));
        assert_eq!(statement.files().len(), 1);
        assert_eq!(statement.get_title(&statement.files()[0]), Some("Sum It Up".to_string()));
    }

    #[test]
    fn falls_back_to_plainproblemname_comment() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join("problem_statement"),
            "problem.tex",
            "%% plainproblemname: Sum It Up\n\\begin{document}\n",
        );
        let mut statement = ProblemStatement::new(dir.path());
        let reporter = Reporter::new();
        assert!(statement.check(&reporter, &Noop));
    }

    #[test]
    fn missing_statement_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut statement = ProblemStatement::new(dir.path());
        let reporter = Reporter::new();
        assert!(!statement.check(&reporter, &Noop));
    }

    #[test]
    fn multiple_locales_without_english_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join("problem_statement"),
            "problem.sv.tex",
            "\\problemname{Summan}\n",
        );
        write_file(
            &dir.path().join("problem_statement"),
            "problem.fr.tex",
            "\\problemname{Somme}\n",
        );
        let mut statement = ProblemStatement::new(dir.path());
        let reporter = Reporter::new();
        assert!(statement.check(&reporter, &Noop));
        assert_eq!(statement.languages(), vec!["fr".to_string(), "sv".to_string()]);
    }

    #[test]
    fn bare_and_english_together_is_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join("problem_statement"),
            "problem.tex",
            "\\problemname{Sum It Up}\n",
        );
        write_file(
            &dir.path().join("problem_statement"),
            "problem.en.tex",
            "\\problemname{Sum It Up}\n",
        );
        let mut statement = ProblemStatement::new(dir.path());
        let reporter = Reporter::new();
        assert!(!statement.check(&reporter, &Noop));
    }

    #[test]
    fn shell_converter_reports_nonzero_exit() {
        let converter = ShellConverter {
            pdf_command: "false".to_string(),
            html_command: "true".to_string(),
        };
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "problem.tex", "\\problemname{X}\n");
        let err = converter.convert_pdf(&dir.path().join("problem.tex"), "").unwrap_err();
        assert!(err.contains("false"));
        assert!(converter.convert_html(&dir.path().join("problem.tex"), "").is_ok());
    }

    #[test]
    fn shell_converter_reproducer_includes_language() {
        let converter = ShellConverter::new();
        assert_eq!(converter.reproducer("problem2pdf", "en"), "problem2pdf -l en");
        assert_eq!(converter.reproducer("problem2html", ""), "problem2html");
    }

    #[test]
    fn failing_converter_reports_reproducer_note() {
        #[derive(Debug)]
        struct AlwaysFails;
        impl ExternalConverter for AlwaysFails {
            fn convert_pdf(&self, _source: &Path, _lang: &str) -> Result<(), String> {
                Err("pdflatex exited 1".to_string())
            }
            fn convert_html(&self, _source: &Path, _lang: &str) -> Result<(), String> {
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join("problem_statement"),
            "problem.tex",
            "\\problemname{Sum It Up}\n",
        );
        let mut statement = ProblemStatement::new(dir.path());
        let reporter = Reporter::new();
        assert!(!statement.check(&reporter, &AlwaysFails));
        assert!(reporter.errors() >= 1);
    }
}
