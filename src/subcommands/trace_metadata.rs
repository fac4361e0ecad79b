//! `ct trace-metadata [--id N] [--path P] [--program S] [-r PID] [--recent
//! [--limit K]] [--test]` (spec.md §4.8): emits a single JSON value on
//! stdout — an object, an array, or `null`.

use ct::catalog::Catalog;
use ct::error::CliError;

use crate::TraceMetadataArgs;

pub fn run(catalog: &Catalog, args: &TraceMetadataArgs) -> Result<i32, CliError> {
    let test = args.test;

    let json = if let Some(id) = args.id {
        serde_json::to_value(catalog.find(id, test)?)
    } else if let Some(path) = &args.path {
        serde_json::to_value(catalog.find_by_path(path, test)?)
    } else if let Some(program) = &args.program {
        serde_json::to_value(catalog.find_by_program_pattern(program, test)?)
    } else if let Some(pid) = args.record_pid {
        serde_json::to_value(catalog.find_by_record_process_id(pid, test)?)
    } else if args.recent {
        serde_json::to_value(catalog.find_recent(args.limit.unwrap_or(10), test)?)
    } else {
        serde_json::to_value(catalog.all(test)?)
    }
    .map_err(|e| CliError::Environment(format!("cannot serialize trace metadata: {e}")))?;

    println!("{json}");
    Ok(0)
}
