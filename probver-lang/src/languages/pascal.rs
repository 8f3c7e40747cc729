use std::path::{Path, PathBuf};

use crate::Language;

/// The Pascal language.
#[derive(Debug, Default)]
pub struct LanguagePascal;

impl LanguagePascal {
    /// Make a new `LanguagePascal`.
    pub fn new() -> LanguagePascal {
        LanguagePascal {}
    }
}

impl Language for LanguagePascal {
    fn name(&self) -> &'static str {
        "Pascal / fpc"
    }

    fn extensions(&self) -> Vec<&'static str> {
        vec!["pas"]
    }

    fn need_compilation(&self) -> bool {
        true
    }

    fn compilation_command(&self, _path: &Path) -> PathBuf {
        PathBuf::from("fpc")
    }

    fn compilation_args(&self, path: &Path) -> Vec<String> {
        let exe_name = self.executable_name(path);
        let exe_name = exe_name.to_string_lossy();
        let mut args: Vec<String> = vec!["-dEVAL", "-Fe/dev/stderr", "-O2", "-XS"]
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        args.push("-o".to_owned() + exe_name.as_ref());
        args.push(
            path.file_name()
                .expect("invalid source file name")
                .to_string_lossy()
                .to_string(),
        );
        args
    }

    /// The executable name is the source file's one without the extension.
    fn executable_name(&self, path: &Path) -> PathBuf {
        let name = PathBuf::from(path.file_name().expect("invalid source file name"));
        PathBuf::from(name.file_stem().expect("invalid source file name"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compilation_args() {
        let lang = LanguagePascal::new();
        let args = lang.compilation_args(Path::new("foo.pas"));
        assert!(args.contains(&"foo.pas".to_string()));
        assert!(args.contains(&"-ofoo".to_string()));
    }

    #[test]
    fn test_executable_name() {
        let lang = LanguagePascal::new();
        assert_eq!(
            lang.executable_name(Path::new("foo.pas")),
            PathBuf::from("foo")
        );
    }
}
