use std::path::{Path, PathBuf};

use crate::Language;

/// The Shell language.
#[derive(Debug, Default)]
pub struct LanguageShell;

impl LanguageShell {
    /// Make a new `LanguageShell`.
    pub fn new() -> LanguageShell {
        LanguageShell {}
    }
}

impl Language for LanguageShell {
    fn name(&self) -> &'static str {
        "Shell"
    }

    fn extensions(&self) -> Vec<&'static str> {
        vec!["sh"]
    }

    fn need_compilation(&self) -> bool {
        false
    }

    fn runtime_command(&self, _path: &Path) -> PathBuf {
        PathBuf::from("sh")
    }

    fn runtime_args(&self, path: &Path, mut args: Vec<String>) -> Vec<String> {
        args.insert(0, self.executable_name(path).to_str().unwrap().to_owned());
        args
    }

    fn executable_name(&self, path: &Path) -> PathBuf {
        // keep the original extension, there is no separate compiled artifact
        PathBuf::from(path.file_name().expect("invalid file name"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executable_name() {
        let lang = LanguageShell::new();
        assert_eq!(
            lang.executable_name(Path::new("foo.sh")),
            PathBuf::from("foo.sh")
        );
    }
}
