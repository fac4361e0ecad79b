//! Reading a trace directory's raw JSON files and normalizing its
//! `sourceFolders` list (spec.md §4.6 step 4 / §8 invariant 5).
//!
//! Grounded on `backend-manager::trace_metadata` (`RawTraceMetadata`,
//! tolerant optional-file reads), generalized from "daemon session info"
//! to "fields the Importer needs to build a `Trace` row".

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RawTraceMetadata {
    pub workdir: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug)]
pub enum TraceMetadataError {
    Io { file: std::path::PathBuf, source: std::io::Error },
    Json { file: std::path::PathBuf, source: serde_json::Error },
}

impl std::fmt::Display for TraceMetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { file, source } => write!(f, "cannot read {}: {source}", file.display()),
            Self::Json { file, source } => write!(f, "cannot parse {}: {source}", file.display()),
        }
    }
}

impl std::error::Error for TraceMetadataError {}

/// Reads `trace_dir/trace_metadata.json` (required).
pub fn read_trace_metadata(trace_dir: &Path) -> Result<RawTraceMetadata, TraceMetadataError> {
    let path = trace_dir.join("trace_metadata.json");
    let contents = std::fs::read_to_string(&path).map_err(|e| TraceMetadataError::Io {
        file: path.clone(),
        source: e,
    })?;
    serde_json::from_str(&contents).map_err(|e| TraceMetadataError::Json { file: path, source: e })
}

/// Reads `trace_dir/trace_paths.json` (optional — a missing file is not an
/// error here, callers decide how to treat it per their own contract).
pub fn read_trace_paths(trace_dir: &Path) -> Option<Vec<String>> {
    let path = trace_dir.join("trace_paths.json");
    let contents = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(paths) => Some(paths),
        Err(e) => {
            log::warn!("trace_paths.json at {} is malformed: {e}", path.display());
            None
        }
    }
}

/// Returns whether `prefix` is `path` itself or a proper directory-boundary
/// prefix of it (`/a/b` is a prefix of `/a/b/c` but not of `/a/bc`).
fn is_prefix_of(prefix: &str, path: &str) -> bool {
    if prefix == path {
        return true;
    }
    path.starts_with(prefix)
        && (prefix.ends_with('/') || path.as_bytes().get(prefix.len()) == Some(&b'/'))
}

/// Normalizes a set of absolute source-related paths into the antichain
/// `sourceFolders` list (spec.md §3 invariant 4, §8 invariant 5):
///
/// 1. Deduplicate.
/// 2. Remove any entry that is a proper prefix of another (keep only
///    antichain leaves).
/// 3. Remove entries that are in a prefix relation with `git_toplevel` in
///    either direction (when non-empty) — both descendants of it and
///    ancestors of it would otherwise collide with the element appended in
///    step 4.
/// 4. Append `git_toplevel` as the last element (when non-empty).
pub fn process_source_folders_list(paths: &[String], git_toplevel: &str) -> Vec<String> {
    let unique: BTreeSet<&str> = paths.iter().map(String::as_str).collect();

    let antichain: Vec<&str> = unique
        .iter()
        .copied()
        .filter(|candidate| {
            !unique
                .iter()
                .any(|other| *other != *candidate && is_prefix_of(candidate, other))
        })
        .collect();

    let mut result: Vec<String> = antichain
        .into_iter()
        .filter(|p| {
            git_toplevel.is_empty() || (!is_prefix_of(git_toplevel, p) && !is_prefix_of(p, git_toplevel))
        })
        .map(String::from)
        .collect();
    result.sort();

    if !git_toplevel.is_empty() {
        result.push(git_toplevel.to_string());
    }

    result
}
