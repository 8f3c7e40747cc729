use std::path::{Path, PathBuf};

/// Trait that defines the properties of a supported language. Most of the methods have a safe
/// blanket implementation, note that not all of them are really optional: based on the value
/// returned by `need_compilation` some of the methods become required.
///
/// A language can be either compiled or not.
///
/// When a language is compiled the extra required implementations are:
/// - `compilation_command`
/// - `compilation_args`
pub trait Language: std::fmt::Debug + Send + Sync {
    /// Full name of the language. This must be unique between all the other languages.
    fn name(&self) -> &'static str;

    /// List of valid extensions for this language. A file is considered in this language if its
    /// extension is inside this list.
    fn extensions(&self) -> Vec<&'static str>;

    /// Whether this language needs a compilation step before it can be run. Returning `true` here
    /// forces the implementation of `compilation_command` and `compilation_args`.
    fn need_compilation(&self) -> bool;

    /// Name (or path) of the compiler to invoke to compile `path`. Will panic if this language
    /// does not support compilation.
    fn compilation_command(&self, _path: &Path) -> PathBuf {
        panic!("Language {} cannot be compiled!", self.name());
    }

    /// Arguments to pass to the compiler to compile the source file. `path` is where the source
    /// file lives and the result of the compilation should be placed at
    /// `self.executable_name(path)`. Will panic if this language does not support compilation.
    fn compilation_args(&self, _path: &Path) -> Vec<String> {
        panic!("Language {} cannot be compiled!", self.name());
    }

    /// Name (or path) of the command to run the program. Defaults to the executable produced by
    /// compilation (or, for uncompiled languages, the source file itself). Languages that need a
    /// separate runtime (e.g. a system-wide interpreter) override this.
    fn runtime_command(&self, path: &Path) -> PathBuf {
        self.executable_name(path)
    }

    /// Arguments to pass to the runtime command, given the extra arguments the caller wants to
    /// pass to the program itself.
    fn runtime_args(&self, _path: &Path, args: Vec<String>) -> Vec<String> {
        args
    }

    /// The name of the file to execute in order to run the program. Defaults to the source file's
    /// name without its extension.
    fn executable_name(&self, path: &Path) -> PathBuf {
        let name = PathBuf::from(path.file_name().expect("invalid file name"));
        PathBuf::from(name.file_stem().expect("invalid file name"))
    }
}
