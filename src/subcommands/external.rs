//! Defers to an external `ct-*` binary on `PATH` or next to the running
//! executable — the boundary spec.md draws around the rest of the CLI
//! surface (`ct-report`, editor integrations, …) that this core does not
//! implement itself.

use std::env;
use std::path::PathBuf;
use std::process::Command;

use ct::error::CliError;

pub fn run_external(args: &[String]) -> Result<i32, CliError> {
    let name = &args[0];
    let exe_name = format!("ct-{name}");
    let passthrough = &args[1..];

    let exe = resolve_executable(&exe_name).ok_or_else(|| {
        CliError::Usage(format!(
            "\"{name}\" subcommand not recognised (maybe you didn't install this module?)"
        ))
    })?;

    let mut child = Command::new(exe)
        .args(passthrough)
        .spawn()
        .map_err(|e| CliError::Environment(format!("failed to launch ct-{name}: {e}")))?;
    let status = child
        .wait()
        .map_err(|e| CliError::Environment(format!("failed waiting on ct-{name}: {e}")))?;
    Ok(status.code().unwrap_or(1))
}

fn resolve_executable(name: &str) -> Option<PathBuf> {
    let exe_dir = env::current_exe().ok().and_then(|x| x.parent().map(|x| x.to_path_buf()));
    if let Some(exe_dir) = exe_dir {
        let candidate = exe_dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    if let Some(paths) = env::var_os("PATH") {
        for dir in env::split_paths(&paths) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }

    None
}
