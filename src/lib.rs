//! CodeTracer recording/replay orchestrator.
//!
//! The binary (`src/main.rs`) is a thin CLI Dispatcher (C8) over the
//! components exposed here: Paths & Config (C1), Trace Catalog (C2),
//! Language Detector (C3), Process Supervisor (C4), Recorder (C5),
//! Importer/Exporter (C6), and Replay Controller (C7).

pub mod catalog;
pub mod config;
pub mod error;
pub mod import_export;
pub mod lang;
pub mod logging;
pub mod paths;
pub mod process;
pub mod recorder;
pub mod replay;
pub mod trace;
pub mod trace_metadata;
