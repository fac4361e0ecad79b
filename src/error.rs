//! Top-level error type consumed at the CLI boundary (C8, spec §7).
//!
//! Every component keeps its own error enum; this module only maps those
//! into an exit code and a user-facing message, following the exit-code
//! policy table of spec.md §7.

use std::fmt;

use crate::catalog::CatalogError;
use crate::import_export::ImportExportError;
use crate::process::ProcessError;
use crate::recorder::RecorderError;
use crate::replay::ReplayError;

/// Sentinel exit code by which the UI requests the CLI re-launch itself.
pub const RESTART_EXIT_CODE: i32 = 64;

#[derive(Debug)]
pub enum CliError {
    /// Mutually-exclusive flags, missing required argument, etc.
    Usage(String),
    /// Missing config file, missing interpreter path, …
    Environment(String),
    /// Op requires `traceSharingEnabled` and it is off.
    SharingDisabled,
    Catalog(CatalogError),
    Recorder(RecorderError),
    ImportExport(ImportExportError),
    Replay(ReplayError),
    Process(ProcessError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "usage error: {msg}"),
            CliError::Environment(msg) => write!(f, "{msg}"),
            CliError::SharingDisabled => {
                write!(f, "trace sharing is disabled in the config file")
            }
            CliError::Catalog(e) => write!(f, "{e}"),
            CliError::Recorder(e) => write!(f, "{e}"),
            CliError::ImportExport(e) => write!(f, "{e}"),
            CliError::Replay(e) => write!(f, "{e}"),
            CliError::Process(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<CatalogError> for CliError {
    fn from(e: CatalogError) -> Self {
        CliError::Catalog(e)
    }
}

impl From<RecorderError> for CliError {
    fn from(e: RecorderError) -> Self {
        CliError::Recorder(e)
    }
}

impl From<ImportExportError> for CliError {
    fn from(e: ImportExportError) -> Self {
        CliError::ImportExport(e)
    }
}

impl From<ReplayError> for CliError {
    fn from(e: ReplayError) -> Self {
        CliError::Replay(e)
    }
}

impl From<ProcessError> for CliError {
    fn from(e: ProcessError) -> Self {
        CliError::Process(e)
    }
}

impl CliError {
    /// Exit code per the §7 policy table. Every kind here maps to `1`;
    /// `RESTART_EXIT_CODE` is only ever returned directly by `main` from a
    /// successful replay loop, never constructed as an error.
    pub fn exit_code(&self) -> i32 {
        1
    }
}
