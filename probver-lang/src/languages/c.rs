use std::path::{Path, PathBuf};

use crate::Language;

/// Version of the C standard and compiler to use.
#[allow(dead_code)]
#[derive(Debug)]
pub enum LanguageCVersion {
    /// gcc with -std=c99
    GccC99,
    /// gcc with -std=c11
    GccC11,
}

/// The C language.
#[derive(Debug)]
pub struct LanguageC {
    pub version: LanguageCVersion,
}

impl LanguageC {
    /// Make a new `LanguageC` using the specified version.
    pub fn new(version: LanguageCVersion) -> LanguageC {
        LanguageC { version }
    }
}

impl Language for LanguageC {
    fn name(&self) -> &'static str {
        match self.version {
            LanguageCVersion::GccC99 => "C99 / gcc",
            LanguageCVersion::GccC11 => "C11 / gcc",
        }
    }

    fn extensions(&self) -> Vec<&'static str> {
        vec!["c"]
    }

    fn need_compilation(&self) -> bool {
        true
    }

    fn compilation_command(&self, _path: &Path) -> PathBuf {
        PathBuf::from("gcc")
    }

    fn compilation_args(&self, path: &Path) -> Vec<String> {
        let exe_name = self.executable_name(path);
        let mut args = vec![
            "-O2".to_string(),
            "-Wall".to_string(),
            "-ggdb3".to_string(),
            "-DEVAL".to_string(),
            "-o".to_string(),
            exe_name.to_str().unwrap().to_string(),
        ];
        match self.version {
            LanguageCVersion::GccC99 => args.push("-std=c99".to_string()),
            LanguageCVersion::GccC11 => args.push("-std=c11".to_string()),
        }
        args.push(path.file_name().unwrap().to_str().unwrap().to_string());
        args
    }

    /// The executable name is the source file's one without the extension.
    fn executable_name(&self, path: &Path) -> PathBuf {
        let name = PathBuf::from(path.file_name().unwrap());
        PathBuf::from(name.file_stem().unwrap())
    }
}
