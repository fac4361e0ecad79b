//! The `Trace` entity (spec.md §3).

use serde::{Deserialize, Serialize};

use crate::lang::Lang;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalltraceMode {
    NoInstrumentation,
    RawRecordNoValues,
    FullRecord,
}

impl CalltraceMode {
    pub fn to_i64(self) -> i64 {
        match self {
            CalltraceMode::NoInstrumentation => 0,
            CalltraceMode::RawRecordNoValues => 1,
            CalltraceMode::FullRecord => 2,
        }
    }

    pub fn from_i64(v: i64) -> CalltraceMode {
        match v {
            1 => CalltraceMode::RawRecordNoValues,
            2 => CalltraceMode::FullRecord,
            _ => CalltraceMode::NoInstrumentation,
        }
    }
}

/// A persisted recording plus its metadata row (spec.md §3).
///
/// Mirrors `trace_metadata.json` field-for-field so the struct can be
/// serialized directly to that file (see [`crate::trace_metadata`]).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trace {
    pub id: i64,
    pub program: String,
    pub args: Vec<String>,
    #[serde(rename = "compileCommand")]
    pub compile_command: String,
    pub env: String,
    pub workdir: String,
    pub lang: Lang,
    #[serde(rename = "outputFolder")]
    pub output_folder: String,
    /// Antichain-ordered absolute directories, space-separated on disk.
    #[serde(rename = "sourceFolders")]
    pub source_folders: Vec<String>,
    #[serde(rename = "lowLevelFolder")]
    pub low_level_folder: Option<String>,
    pub imported: bool,
    #[serde(rename = "shellID")]
    pub shell_id: i64,
    #[serde(rename = "rrPid")]
    pub rr_pid: i64,
    #[serde(rename = "exitCode")]
    pub exit_code: i64,
    pub calltrace: bool,
    #[serde(rename = "calltraceMode")]
    pub calltrace_mode: CalltraceMode,
    pub date: String,
    #[serde(rename = "downloadId")]
    pub download_id: String,
    #[serde(rename = "controlId")]
    pub control_id: String,
    pub key: String,
}

impl Trace {
    /// Joins `source_folders` the way the on-disk/db representation stores
    /// them: a single space-separated string (spec.md §3).
    pub fn source_folders_joined(&self) -> String {
        self.source_folders.join(" ")
    }

    pub fn source_folders_from_joined(s: &str) -> Vec<String> {
        s.split(' ').filter(|p| !p.is_empty()).map(String::from).collect()
    }
}
