//! Replay Controller (C7): resolves a user-supplied target to a `Trace`,
//! then launches the REPL or UI against it, handling the `RESTART_EXIT_CODE`
//! loop (spec.md §4.7).

use std::io::{self, Write};
use std::path::Path;

use crate::catalog::{Catalog, CatalogError};
use crate::error::RESTART_EXIT_CODE;
use crate::paths::Paths;
use crate::process::{self, ProcessError, SpawnSpec, StdioPolicy};
use crate::trace::Trace;

#[derive(Debug)]
pub enum ReplayError {
    NotFound(String),
    Catalog(CatalogError),
    Process(ProcessError),
    Io(std::io::Error),
}

impl std::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayError::NotFound(what) => write!(f, "no matching trace: {what}"),
            ReplayError::Catalog(e) => write!(f, "{e}"),
            ReplayError::Process(e) => write!(f, "{e}"),
            ReplayError::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for ReplayError {}

impl From<CatalogError> for ReplayError {
    fn from(e: CatalogError) -> Self {
        ReplayError::Catalog(e)
    }
}
impl From<ProcessError> for ReplayError {
    fn from(e: ProcessError) -> Self {
        ReplayError::Process(e)
    }
}
impl From<std::io::Error> for ReplayError {
    fn from(e: std::io::Error) -> Self {
        ReplayError::Io(e)
    }
}

/// A resolved "which trace do you mean" selection (Design Note §9: an
/// explicit tagged value instead of a try-parse-int-else-folder idiom).
#[derive(Debug, Clone)]
pub enum ReplayTarget {
    Id(i64),
    Path(String),
    Pattern(String),
}

impl ReplayTarget {
    /// Builds a target from already-validated, mutually-exclusive CLI
    /// inputs. Priority, per spec.md §4.7: `--id` > `--trace-folder` >
    /// positional pattern. Mutual-exclusion itself is validated by the CLI
    /// dispatcher (C8) before this is called.
    pub fn parse_cli(id: Option<i64>, trace_folder: Option<String>, pattern: Option<String>) -> Option<ReplayTarget> {
        if let Some(id) = id {
            return Some(ReplayTarget::Id(id));
        }
        if let Some(folder) = trace_folder {
            return Some(ReplayTarget::Path(folder));
        }
        pattern.map(ReplayTarget::Pattern)
    }
}

/// Resolves `target` to a `Trace`, falling back to the interactive menu
/// when no target was given.
pub fn resolve(catalog: &Catalog, target: Option<ReplayTarget>, test: bool) -> Result<Trace, ReplayError> {
    match target {
        Some(ReplayTarget::Id(id)) => {
            catalog.find(id, test)?.ok_or_else(|| ReplayError::NotFound(format!("id {id}")))
        }
        Some(ReplayTarget::Path(path)) => {
            catalog.find_by_path(&path, test)?.ok_or_else(|| ReplayError::NotFound(path))
        }
        Some(ReplayTarget::Pattern(pattern)) => {
            if let Ok(id) = pattern.parse::<i64>() {
                if let Some(trace) = catalog.find(id, test)? {
                    return Ok(trace);
                }
            }
            catalog
                .find_by_program_pattern(&pattern, test)?
                .ok_or_else(|| ReplayError::NotFound(pattern))
        }
        None => run_interactive_menu(catalog, test),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(max.saturating_sub(1)).collect();
        t.push('…');
        t
    }
}

/// Lists up to the 10 most recent traces (newest first) and prompts for an
/// id; invalid input loops (spec.md §4.7, §8 "Interactive menu" scenario).
fn run_interactive_menu(catalog: &Catalog, test: bool) -> Result<Trace, ReplayError> {
    loop {
        let mut rows = catalog.find_recent(11, test)?;
        if rows.is_empty() {
            return Err(ReplayError::NotFound("no traces have been recorded yet".to_string()));
        }
        let has_more = rows.len() > 10;
        rows.truncate(10);

        println!("{:<5} {:<40} {:<30} {:<10} {}", "id", "command", "workdir", "lang", "date");
        for trace in &rows {
            let command = truncate(&format!("{} {}", trace.program, trace.args.join(" ")), 40);
            let workdir = truncate(&trace.workdir, 30);
            println!(
                "{:<5} {:<40} {:<30} {:<10} {}",
                trace.id,
                command,
                workdir,
                trace.lang.to_string(),
                trace.date
            );
        }
        if has_more {
            println!("(older traces not shown)");
        }

        print!("Enter id to replay: ");
        io::stdout().flush().ok();
        let mut line = String::new();
        io::stdin().read_line(&mut line)?;

        match line.trim().parse::<i64>() {
            Ok(id) => match catalog.find(id, test)? {
                Some(trace) => return Ok(trace),
                None => println!("no trace with id {id}, try again"),
            },
            Err(_) => println!("please enter a numeric id"),
        }
    }
}

/// REPL mode: `[id, caller_pid, maybe "--test", maybe "--summary" <path>]`.
pub fn launch_repl(
    paths: &Paths,
    trace: &Trace,
    caller_pid: u32,
    test: bool,
    summary: Option<&Path>,
) -> Result<i32, ReplayError> {
    let console_exe = paths.links_dir.join("console");
    let mut argv = vec![console_exe.display().to_string(), trace.id.to_string(), caller_pid.to_string()];
    if test {
        argv.push("--test".to_string());
    }
    if let Some(summary) = summary {
        argv.push("--summary".to_string());
        argv.push(summary.display().to_string());
    }
    let spec = SpawnSpec::new(argv).stdio(StdioPolicy::Inherit);
    let child = process::spawn(&spec)?;
    Ok(process::wait(child)?)
}

/// UI mode: starts the core process, then the UI, handling the
/// `RESTART_EXIT_CODE` loop (spec.md §4.7). On the first iteration the core
/// and UI are spawned directly; on every subsequent iteration (a restart
/// request) `ct replay --id=<id>` is re-launched as a subprocess instead,
/// so command-line state is reset exactly as specified.
pub fn launch_ui(
    paths: &Paths,
    trace: &Trace,
    caller_pid: u32,
    test: bool,
    record_core: bool,
    extra_args: &[String],
) -> Result<i32, ReplayError> {
    let id = trace.id;
    let mut first_iteration = true;

    loop {
        let exit_code = if first_iteration {
            let core_child = process::start_core_process(paths, id, record_core, caller_pid, test)?;

            let electron_index = paths.share_dir.join("electron/index.js");
            let mut argv = vec![
                paths.links_dir.join("electron").display().to_string(),
                electron_index.display().to_string(),
                id.to_string(),
                "--caller-pid".to_string(),
                caller_pid.to_string(),
            ];
            argv.extend(extra_args.iter().cloned());

            let spec = SpawnSpec::new(argv).stdio(StdioPolicy::Inherit);
            let ui_child = process::spawn(&spec)?;
            process::set_ui_pid(ui_child.id());
            let code = process::wait(ui_child)?;
            process::clear_ui_pid();
            process::stop_core(core_child, record_core)?;
            code
        } else {
            log::info!("UI requested restart; re-launching `ct replay --id={id}`");
            let current_exe = std::env::current_exe()?;
            let spec = SpawnSpec::new(vec![
                current_exe.display().to_string(),
                "replay".to_string(),
                format!("--id={id}"),
            ])
            .stdio(StdioPolicy::Inherit);
            let child = process::spawn(&spec)?;
            process::wait(child)?
        };

        if exit_code == RESTART_EXIT_CODE {
            first_iteration = false;
            continue;
        }
        return Ok(exit_code);
    }
}

/// Launches the UI with no trace selected yet (the bare `ct` invocation,
/// spec.md §4.8 "(none) launches UI without a trace"). No core process is
/// started since there is nothing to replay.
pub fn launch_ui_without_trace(paths: &Paths, caller_pid: u32, extra_args: &[String]) -> Result<i32, ReplayError> {
    let electron_index = paths.share_dir.join("electron/index.js");
    let mut argv = vec![
        paths.links_dir.join("electron").display().to_string(),
        electron_index.display().to_string(),
        "--caller-pid".to_string(),
        caller_pid.to_string(),
    ];
    argv.extend(extra_args.iter().cloned());
    let spec = SpawnSpec::new(argv).stdio(StdioPolicy::Inherit);
    let child = process::spawn(&spec)?;
    Ok(process::wait(child)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::new_trace;

    fn test_paths() -> (tempfile::TempDir, Paths) {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Paths::resolve();
        paths.trace_dir = dir.path().join("traces");
        paths.test_dir = dir.path().join("test-traces");
        (dir, paths)
    }

    #[test]
    fn parse_cli_priority_id_over_path_over_pattern() {
        let target = ReplayTarget::parse_cli(Some(5), Some("/tmp/x".to_string()), Some("pat".to_string()));
        assert!(matches!(target, Some(ReplayTarget::Id(5))));

        let target = ReplayTarget::parse_cli(None, Some("/tmp/x".to_string()), Some("pat".to_string()));
        assert!(matches!(target, Some(ReplayTarget::Path(p)) if p == "/tmp/x"));

        let target = ReplayTarget::parse_cli(None, None, Some("pat".to_string()));
        assert!(matches!(target, Some(ReplayTarget::Pattern(p)) if p == "pat"));

        assert!(ReplayTarget::parse_cli(None, None, None).is_none());
    }

    #[test]
    fn resolve_by_id_not_found() {
        let (_dir, paths) = test_paths();
        let catalog = Catalog::open(&paths).unwrap();
        let err = resolve(&catalog, Some(ReplayTarget::Id(999)), false).unwrap_err();
        assert!(matches!(err, ReplayError::NotFound(_)));
    }

    #[test]
    fn resolve_by_id_found() {
        let (_dir, paths) = test_paths();
        let catalog = Catalog::open(&paths).unwrap();
        let id = catalog.new_id(false).unwrap();
        catalog.record_trace(&new_trace(id), false).unwrap();
        let trace = resolve(&catalog, Some(ReplayTarget::Id(id)), false).unwrap();
        assert_eq!(trace.id, id);
    }

    #[test]
    fn truncate_adds_ellipsis_only_when_needed() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10).chars().count(), 10);
    }
}
