//! Language Detector (C3).
//!
//! Extends the teacher's `ct::lang::Lang` (which only covered the
//! recordable languages) with the full catalog tag set from spec.md §3,
//! and its `ct::subcommands::record` detection functions into a single
//! pure `detect_lang`.

use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lang {
    C,
    Cpp,
    Rust,
    Nim,
    Go,
    RubyDb,
    Noir,
    Small,
    Python,
    Asm,
    Unknown,
}

impl Lang {
    /// Only db-based languages have a tracer the Recorder can invoke.
    pub fn is_db_based(&self) -> bool {
        matches!(self, Lang::RubyDb | Lang::Noir | Lang::Small | Lang::Python)
    }

    /// Stable integer encoding for the `lang` column (SQLite has no enum
    /// type, see `catalog::schema`).
    pub fn to_i64(self) -> i64 {
        match self {
            Lang::C => 0,
            Lang::Cpp => 1,
            Lang::Rust => 2,
            Lang::Nim => 3,
            Lang::Go => 4,
            Lang::RubyDb => 5,
            Lang::Noir => 6,
            Lang::Small => 7,
            Lang::Python => 8,
            Lang::Asm => 9,
            Lang::Unknown => 10,
        }
    }

    pub fn from_i64(v: i64) -> Lang {
        match v {
            0 => Lang::C,
            1 => Lang::Cpp,
            2 => Lang::Rust,
            3 => Lang::Nim,
            4 => Lang::Go,
            5 => Lang::RubyDb,
            6 => Lang::Noir,
            7 => Lang::Small,
            8 => Lang::Python,
            9 => Lang::Asm,
            _ => Lang::Unknown,
        }
    }
}

impl ToString for Lang {
    fn to_string(&self) -> String {
        match self {
            Lang::C => "c",
            Lang::Cpp => "cpp",
            Lang::Rust => "rust",
            Lang::Nim => "nim",
            Lang::Go => "go",
            Lang::RubyDb => "ruby_db",
            Lang::Noir => "noir",
            Lang::Small => "small",
            Lang::Python => "python",
            Lang::Asm => "asm",
            Lang::Unknown => "unknown",
        }
        .to_string()
    }
}

/// Maps a program path to a `Lang`, per spec.md §4.3:
/// 1. An explicit override always wins.
/// 2. A directory containing `Nargo.toml` is `Noir`.
/// 3. Otherwise dispatch on file suffix.
/// 4. Otherwise `Unknown`.
pub fn detect_lang(program: &Path, lang_override: Lang) -> Lang {
    if lang_override != Lang::Unknown {
        return lang_override;
    }

    if program.is_dir() {
        if program.join("Nargo.toml").is_file() {
            return Lang::Noir;
        }
        return Lang::Unknown;
    }

    let ext = program
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("rb") => Lang::RubyDb,
        Some("nr") => Lang::Noir,
        Some("small") => Lang::Small,
        _ => Lang::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_always_wins() {
        assert_eq!(
            detect_lang(Path::new("anything.rb"), Lang::Python),
            Lang::Python
        );
    }

    #[test]
    fn suffix_detection() {
        assert_eq!(detect_lang(Path::new("a.rb"), Lang::Unknown), Lang::RubyDb);
        assert_eq!(detect_lang(Path::new("a.nr"), Lang::Unknown), Lang::Noir);
        assert_eq!(
            detect_lang(Path::new("a.small"), Lang::Unknown),
            Lang::Small
        );
        assert_eq!(
            detect_lang(Path::new("a.xyz"), Lang::Unknown),
            Lang::Unknown
        );
    }

    #[test]
    fn is_idempotent() {
        let path = Path::new("prog.rb");
        let first = detect_lang(path, Lang::Unknown);
        let second = detect_lang(path, first);
        assert_eq!(first, second);
    }

    #[test]
    fn only_db_based_languages_are_recordable() {
        assert!(Lang::RubyDb.is_db_based());
        assert!(Lang::Noir.is_db_based());
        assert!(Lang::Small.is_db_based());
        assert!(Lang::Python.is_db_based());
        assert!(!Lang::Unknown.is_db_based());
        assert!(!Lang::Rust.is_db_based());
    }

    #[test]
    fn nargo_folder_detected_as_noir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Nargo.toml"), "").unwrap();
        assert_eq!(detect_lang(dir.path(), Lang::Unknown), Lang::Noir);
    }
}
