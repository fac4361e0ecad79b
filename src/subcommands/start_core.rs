//! `ct start_core TRACE_ARG CALLER_PID [--test]` (spec.md §4.8): resolves a
//! trace and spawns the core process standalone (no UI), for callers that
//! launch the UI themselves (e.g. editor integrations). Prints the core
//! process's pid and returns without waiting on it.

use ct::catalog::Catalog;
use ct::error::CliError;
use ct::paths::Paths;
use ct::process;
use ct::replay::{self, ReplayTarget};

use crate::StartCoreArgs;

pub fn run(paths: &Paths, catalog: &Catalog, args: &StartCoreArgs) -> Result<i32, CliError> {
    let target = match args.trace_arg.parse::<i64>() {
        Ok(id) => ReplayTarget::Id(id),
        Err(_) => ReplayTarget::Path(args.trace_arg.clone()),
    };
    let trace = replay::resolve(catalog, Some(target), args.test)?;

    let caller_pid: u32 = args
        .caller_pid
        .try_into()
        .map_err(|_| CliError::Usage(format!("invalid caller pid: {}", args.caller_pid)))?;

    let child = process::start_core_process(paths, trace.id, false, caller_pid, args.test)?;
    println!("{}", child.id());
    Ok(0)
}
