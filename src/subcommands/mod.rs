//! CLI Dispatcher (C8) subcommand implementations. Each file owns one
//! subcommand's glue between parsed `clap` arguments and the library
//! components in `ct::*`; the `Args`/`Command` shapes themselves live in
//! `main.rs`, mirroring the teacher's existing split.

pub mod external;
pub mod import;
pub mod list;
pub mod record;
pub mod replay;
pub mod start_core;
pub mod trace_metadata;
