use std::fs::File;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::status::TerminationStatus;
use crate::{Language, LanguageManager};

/// A compiled (or directly interpretable) program built from a source file.
///
/// This is the concrete realization of the opaque "Program" every validator, grader and
/// submission is wrapped in: a `name`, a `compile()` step, and a `run()` step that executes the
/// program as a direct child process and reports back how it terminated and how long it took.
#[derive(Debug, Clone)]
pub struct Program {
    /// Path to the source file.
    path: PathBuf,
    /// Directory the compiled executable (or, for uncompiled languages, a symlink-free copy) is
    /// written to.
    work_dir: PathBuf,
    /// Language of the source file.
    language: Arc<dyn Language>,
    /// Set once `compile()` has been called at least once.
    compiled: bool,
}

impl Program {
    /// Build a new `Program` from the given source file, detecting its language automatically.
    /// Returns `None` if the language is unknown.
    ///
    /// `work_dir` is where the (possibly compiled) executable is placed; it must already exist.
    pub fn new<P: Into<PathBuf>, W: Into<PathBuf>>(path: P, work_dir: W) -> Option<Program> {
        let path = path.into();
        let language = LanguageManager::detect_language(&path)?;
        Some(Program {
            path,
            work_dir: work_dir.into(),
            language,
            compiled: false,
        })
    }

    /// The display name of this program, its source file's file name.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .expect("invalid source file path")
            .to_string_lossy()
            .to_string()
    }

    /// Copy the source file into `work_dir` under its own name, if it is not already there.
    /// `fs::copy` preserves the source's permission bits, so an executable script stays
    /// executable.
    fn stage(&self) -> Result<()> {
        let staged = self.work_dir.join(self.name());
        if staged != self.path {
            std::fs::copy(&self.path, &staged)
                .with_context(|| format!("failed to stage {:?} into {:?}", self.path, self.work_dir))?;
        }
        Ok(())
    }

    /// Compile the program, if its language needs it. Interpreted languages are considered
    /// already compiled. Returns `true` on success (or if no compilation was needed), `false` if
    /// the compiler exited with a nonzero status or failed to spawn.
    pub fn compile(&mut self) -> Result<bool> {
        // Compiled and interpreted languages alike are invoked (for compilation or directly, in
        // the autodetect-interpreter case) with the source file's bare name as an argument and
        // `work_dir` as the process cwd, so the source must actually live there; stage a copy
        // rather than requiring callers to pre-arrange that.
        self.stage()?;
        if !self.language.need_compilation() {
            self.compiled = true;
            return Ok(true);
        }
        let command = self.language.compilation_command(&self.path);
        let args = self.language.compilation_args(&self.path);
        let status = Command::new(&command)
            .args(&args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .status()
            .with_context(|| format!("failed to spawn compiler {:?} for {}", command, self.name()))?;
        self.compiled = status.success();
        Ok(self.compiled)
    }

    /// Run the program with the given standard input/output redirections and extra arguments,
    /// optionally under a CPU time limit. Returns the way the process terminated and its wall
    /// runtime in seconds.
    ///
    /// `timelim` bounds the child's CPU time (via `setrlimit(RLIMIT_CPU, ...)` in the child)
    /// rather than wall time; a process that spins without consuming CPU is not killed by this
    /// alone.
    pub fn run(
        &self,
        stdin: Option<&Path>,
        stdout: Option<&Path>,
        args: &[String],
        timelim: Option<u64>,
    ) -> Result<(TerminationStatus, f64)> {
        // Build the invocation directly from `runtime_command`/`runtime_args` rather than via
        // `get_runcmd()`: that helper bakes in an empty arg list (for splicing into the
        // interactive runner's argv), and re-running `runtime_args` here with the real `args`
        // would duplicate whatever it prepends (e.g. the script name for shell/Python).
        let mut command = Command::new(self.language.runtime_command(&self.path));
        command.args(self.language.runtime_args(&self.path, args.to_vec()));
        command.current_dir(&self.work_dir);

        if let Some(stdin) = stdin {
            command.stdin(
                File::open(stdin).with_context(|| format!("failed to open stdin file {:?}", stdin))?,
            );
        } else {
            command.stdin(Stdio::null());
        }
        if let Some(stdout) = stdout {
            command.stdout(
                File::create(stdout)
                    .with_context(|| format!("failed to create stdout file {:?}", stdout))?,
            );
        } else {
            command.stdout(Stdio::null());
        }

        if let Some(timelim) = timelim {
            unsafe {
                command.pre_exec(move || rlimit::setrlimit(rlimit::Resource::CPU, timelim, timelim + 1));
            }
        }

        let start = Instant::now();
        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.name()))?;
        let exit_status = child
            .wait()
            .with_context(|| format!("failed to wait for {}", self.name()))?;
        let runtime = start.elapsed().as_secs_f64();

        Ok((TerminationStatus::from_exit_status(exit_status), runtime))
    }

    /// The argument vector used to invoke this program, not including any per-run arguments.
    /// An interactive runner splices this directly into its own argv to launch the submission
    /// alongside the validator.
    pub fn get_runcmd(&self) -> Vec<String> {
        let command = self.language.runtime_command(&self.path);
        let mut runcmd = vec![command.to_string_lossy().to_string()];
        runcmd.extend(self.language.runtime_args(&self.path, vec![]));
        runcmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_script(path: &Path, body: &str) {
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(format!("#!/bin/sh\n{}\n", body).as_bytes()).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    /// A shell script run with extra arguments must see them at `$1`, `$2`, ... untouched by its
    /// own script name: the invocation must not duplicate what `runtime_args` already prepends.
    #[test]
    fn run_does_not_shift_args_for_shell_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("echo_args.sh");
        write_script(&script, "printf '%s,%s,%s' \"$1\" \"$2\" \"$3\"");
        let mut program = Program::new(&script, dir.path()).unwrap();
        program.compile().unwrap();

        let outfile = dir.path().join("out.txt");
        let args = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let (status, _runtime) = program.run(None, Some(&outfile), &args, None).unwrap();
        assert_eq!(status, TerminationStatus::Exited(0));

        let output = std::fs::read_to_string(&outfile).unwrap();
        assert_eq!(output, "one,two,three");
    }
}
