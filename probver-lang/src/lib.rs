//! Language detection, compilation and synchronous execution of helper programs and reference
//! submissions.
//!
//! The [`Language`] trait exposes the interface for defining new programming languages; the
//! supported ones live under [`languages`]. [`LanguageManager`] detects the language of a source
//! file from its extension, and [`Program`] wraps a source file with its compile/run lifecycle.
//! [`status`] decodes the POSIX termination status of a finished child into a domain verdict.
//!
//! # Example
//!
//! ```
//! use probver_lang::LanguageManager;
//!
//! let lang = LanguageManager::detect_language("test.cpp").expect("unknown lang");
//! assert!(lang.name().contains("C++"));
//! ```

#![deny(missing_docs)]

#[macro_use]
extern crate lazy_static;

mod language;
mod languages;
mod program;
pub mod status;

pub use language::Language;
pub use program::Program;
pub use status::TerminationStatus;

use languages::{c, cpp, pascal, python, shell};
use std::path::Path;
use std::sync::Arc;

/// Manager of all the known languages; use this to get [`Language`] instances.
pub struct LanguageManager {
    known_languages: Vec<Arc<dyn Language + Sync + Send>>,
}

impl LanguageManager {
    fn new() -> LanguageManager {
        LanguageManager {
            // ordered by most important first
            known_languages: vec![
                Arc::new(cpp::LanguageCpp::new(cpp::LanguageCppVersion::GccCpp14)),
                Arc::new(c::LanguageC::new(c::LanguageCVersion::GccC11)),
                Arc::new(python::LanguagePython::new(
                    python::LanguagePythonVersion::Autodetect,
                )),
                Arc::new(shell::LanguageShell::new()),
                Arc::new(pascal::LanguagePascal::new()),
            ],
        }
    }

    /// Given a path to a file, guess which language the source file probably is.
    ///
    /// ```
    /// use probver_lang::LanguageManager;
    ///
    /// let cpp = LanguageManager::detect_language("test.cpp").unwrap();
    /// assert!(cpp.name().contains("C++"));
    /// let py = LanguageManager::detect_language("test.py").unwrap();
    /// assert!(py.name().contains("Python"));
    /// let unknown = LanguageManager::detect_language("test.foobar");
    /// assert!(unknown.is_none());
    /// ```
    pub fn detect_language<P: AsRef<Path>>(path: P) -> Option<Arc<dyn Language>> {
        let manager = &LANGUAGE_MANAGER_SINGL;
        let ext = path
            .as_ref()
            .extension()
            .map(|s| s.to_string_lossy())
            .unwrap_or_else(|| "".into())
            .to_lowercase();
        for lang in manager.known_languages.iter() {
            for lang_ext in lang.extensions().iter() {
                if ext == *lang_ext {
                    return Some(lang.clone());
                }
            }
        }
        None
    }

    /// Search among the known languages for the one with the specified name.
    pub(crate) fn from_name<S: AsRef<str>>(name: S) -> Option<Arc<dyn Language>> {
        let manager = &LANGUAGE_MANAGER_SINGL;
        for lang in manager.known_languages.iter() {
            if lang.name() == name.as_ref() {
                return Some(lang.clone());
            }
        }
        None
    }
}

lazy_static! {
    /// The singleton instance of the `LanguageManager`.
    static ref LANGUAGE_MANAGER_SINGL: LanguageManager = LanguageManager::new();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::cpp::LanguageCpp;

    #[test]
    fn test_detect_language() {
        let lang = LanguageManager::detect_language("foo.cpp").unwrap();
        let name = LanguageCpp::new(cpp::LanguageCppVersion::GccCpp14).name();
        assert_eq!(lang.name(), name);
    }

    #[test]
    fn test_detect_language_uppercase() {
        let lang = LanguageManager::detect_language("foo.CPP").unwrap();
        let name = LanguageCpp::new(cpp::LanguageCppVersion::GccCpp14).name();
        assert_eq!(lang.name(), name);
    }

    #[test]
    fn test_detect_language_unknown() {
        let lang = LanguageManager::detect_language("foo.blah");
        assert!(lang.is_none());
    }

    #[test]
    fn test_from_name() {
        let name = LanguageCpp::new(cpp::LanguageCppVersion::GccCpp14).name();
        let lang = LanguageManager::from_name(name).unwrap();
        assert_eq!(lang.name(), name);
    }

    #[test]
    fn test_from_name_unknown() {
        let lang = LanguageManager::from_name("Nope, this is not a language");
        assert!(lang.is_none());
    }
}
