//! `ct replay` / `ct console` / `ct upload` (spec.md §4.7/§4.8): all three
//! share the same `{--id, --trace-folder, PATTERN, --interactive}` target
//! resolution, then diverge on what they do with the resolved `Trace`.

use std::path::Path;

use ct::catalog::Catalog;
use ct::config::Config;
use ct::error::CliError;
use ct::import_export;
use ct::paths::Paths;
use ct::replay::{self, ReplayTarget};

use crate::ReplayArgs;

/// Validates the replay/console/upload triad's mutual exclusion (spec.md
/// §4.8): at most one of `{pattern, id, trace-folder, interactive}` may be
/// set; none of them set means "use the interactive menu".
fn resolve_target(args: &ReplayArgs) -> Result<Option<ReplayTarget>, CliError> {
    let set_count = [args.pattern.is_some(), args.id.is_some(), args.trace_folder.is_some(), args.interactive.is_some()]
        .iter()
        .filter(|set| **set)
        .count();
    if set_count > 1 {
        return Err(CliError::Usage(
            "at most one of --id, --trace-folder, a pattern, or --interactive may be given".to_string(),
        ));
    }

    let target = ReplayTarget::parse_cli(args.id, args.trace_folder.clone(), args.pattern.clone());
    let interactive = match args.interactive {
        Some(explicit) => explicit,
        None => target.is_none(),
    };

    if !interactive && target.is_none() {
        return Err(CliError::Usage(
            "--interactive=false requires --id, --trace-folder, or a pattern".to_string(),
        ));
    }

    Ok(if interactive { None } else { target })
}

pub fn run_replay(paths: &Paths, catalog: &Catalog, caller_pid: u32, args: &ReplayArgs) -> Result<i32, CliError> {
    let target = resolve_target(args)?;
    let trace = replay::resolve(catalog, target, args.test)?;
    let code = replay::launch_ui(paths, &trace, caller_pid, args.test, false, &[])?;
    Ok(code)
}

pub fn run_console(paths: &Paths, catalog: &Catalog, caller_pid: u32, args: &ReplayArgs) -> Result<i32, CliError> {
    let target = resolve_target(args)?;
    let trace = replay::resolve(catalog, target, args.test)?;
    let code = replay::launch_repl(paths, &trace, caller_pid, args.test, None)?;
    Ok(code)
}

pub fn run_upload(catalog: &Catalog, config: &Config, args: &ReplayArgs) -> Result<i32, CliError> {
    if !config.trace_sharing_enabled {
        return Err(CliError::SharingDisabled);
    }
    let target = resolve_target(args)?;
    let trace = replay::resolve(catalog, target, args.test)?;

    let password = import_export::upload(config, &trace)?;
    let download_id = trace.id.to_string();
    let program_name = Path::new(&trace.program)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| trace.program.clone());
    let key = import_export::composite_key(&program_name, &download_id, &password);

    catalog.update_field(trace.id, "downloadId", &download_id, args.test)?;
    catalog.update_field(trace.id, "key", &key, args.test)?;

    println!("{key}");
    Ok(0)
}
