//! Process Supervisor (C4): spawning/waiting on language tracers, the core
//! process, and the UI process; signal handling and guaranteed cleanup.
//!
//! Grounded on `backend-manager::main` (`is_pid_alive` via `libc::kill`,
//! PID-file idiom) for the raw-PID plumbing, and on the `signal-hook`
//! flag-registration idiom (spec.md §3 invariant 6: "signal handlers must
//! not assume heap allocators are safe"). The orchestrator itself stays
//! synchronous top-to-bottom (spec.md §5) — no tokio.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use crate::paths::Paths;

#[derive(Debug)]
pub enum ProcessError {
    Spawn { program: String, source: std::io::Error },
    Wait(std::io::Error),
    NonZeroExit(i32),
    ExecutableNotFound(String),
}

impl std::fmt::Display for ProcessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessError::Spawn { program, source } => {
                write!(f, "failed to spawn {program}: {source}")
            }
            ProcessError::Wait(e) => write!(f, "failed waiting on child process: {e}"),
            ProcessError::NonZeroExit(code) => write!(f, "child process exited with code {code}"),
            ProcessError::ExecutableNotFound(name) => {
                write!(f, "could not locate executable: {name}")
            }
        }
    }
}

impl std::error::Error for ProcessError {}

/// How a spawned child's standard streams are wired up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioPolicy {
    /// Share the parent's stdin/stdout/stderr (record/REPL/UI children).
    Inherit,
    /// Pipe stdout and forward complete lines back to the caller.
    CaptureLines,
    /// Redirect stdout/stderr to `/dev/null`-equivalent (background core).
    Discard,
}

/// Everything needed to spawn one child process.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub argv: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Extra/overriding environment variables, merged case-insensitively on
    /// top of the inherited environment (last write for a given key wins).
    /// Keyed by the upper-cased key so e.g. `"Path"` then `"PATH"` collide
    /// at this layer the same way spec.md §4.4 requires; the originally
    /// given casing is what actually gets passed to the child process.
    pub env: BTreeMap<String, (String, String)>,
    pub stdio: StdioPolicy,
}

impl SpawnSpec {
    pub fn new(argv: Vec<String>) -> SpawnSpec {
        SpawnSpec {
            argv,
            cwd: None,
            env: BTreeMap::new(),
            stdio: StdioPolicy::Inherit,
        }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let normalized = key.to_ascii_uppercase();
        self.env.insert(normalized, (key, value.into()));
        self
    }

    pub fn stdio(mut self, policy: StdioPolicy) -> Self {
        self.stdio = policy;
        self
    }
}

/// Spawns `spec`, returning the live `Child` (not yet waited on).
pub fn spawn(spec: &SpawnSpec) -> Result<Child, ProcessError> {
    let program = spec
        .argv
        .first()
        .cloned()
        .unwrap_or_else(|| "<empty argv>".to_string());

    let mut command = Command::new(&program);
    command.args(&spec.argv[1..]);

    if let Some(cwd) = &spec.cwd {
        command.current_dir(cwd);
    }
    for (original_key, value) in spec.env.values() {
        command.env(original_key, value);
    }

    match spec.stdio {
        StdioPolicy::Inherit => {
            command.stdin(Stdio::inherit()).stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        StdioPolicy::CaptureLines => {
            command.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        }
        StdioPolicy::Discard => {
            command.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
        }
    }

    command.spawn().map_err(|source| ProcessError::Spawn { program, source })
}

/// Spawns `spec` with [`StdioPolicy::CaptureLines`] and returns the child
/// plus a channel of complete stdout lines, read on a background thread —
/// the synchronous stand-in for the "line-oriented, event-driven" I/O of
/// spec.md §5.
pub fn spawn_with_line_stream(mut spec: SpawnSpec) -> Result<(Child, Receiver<String>), ProcessError> {
    spec.stdio = StdioPolicy::CaptureLines;
    let mut child = spawn(&spec)?;
    let stdout = child.stdout.take().expect("CaptureLines always pipes stdout");
    let (tx, rx) = std::sync::mpsc::channel();
    thread::spawn(move || {
        let reader = BufReader::new(stdout);
        for line in reader.lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    Ok((child, rx))
}

/// Blocks until `child` exits, returning its exit code (or `1` if killed by
/// a signal, matching the "non-zero exit aborts with exit code 1" policy).
pub fn wait(mut child: Child) -> Result<i32, ProcessError> {
    let status = child.wait().map_err(ProcessError::Wait)?;
    Ok(status.code().unwrap_or(1))
}

/// Spawns and waits in one call, failing with [`ProcessError::NonZeroExit`]
/// on a non-zero exit code (the language-tracer failure policy of §4.4).
pub fn run_to_completion(spec: &SpawnSpec) -> Result<(), ProcessError> {
    let child = spawn(spec)?;
    let code = wait(child)?;
    if code != 0 {
        return Err(ProcessError::NonZeroExit(code));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// PID registry: replaces the original's global mutable `electronPid`/
// `rrPid` with a process-local, lock-free atomic slot owned by this module
// (Design Note §9).
// ---------------------------------------------------------------------------

/// `0` means "no UI child currently tracked".
static UI_PID: AtomicU32 = AtomicU32::new(0);
/// `0` means "no rr/backend child currently tracked".
static CORE_PID: AtomicU32 = AtomicU32::new(0);

pub fn set_ui_pid(pid: u32) {
    UI_PID.store(pid, Ordering::SeqCst);
}

pub fn clear_ui_pid() {
    UI_PID.store(0, Ordering::SeqCst);
}

pub fn set_core_pid(pid: u32) {
    CORE_PID.store(pid, Ordering::SeqCst);
}

pub fn clear_core_pid() {
    CORE_PID.store(0, Ordering::SeqCst);
}

fn kill(pid: u32, signal: libc::c_int) {
    // SAFETY: `kill` is async-signal-safe and pid is a plain integer; no
    // heap access, matches invariant 6.
    unsafe {
        libc::kill(pid as libc::pid_t, signal);
    }
}

// ---------------------------------------------------------------------------
// Signal handling
// ---------------------------------------------------------------------------

type CleanupHook = Box<dyn Fn() + Send + Sync + 'static>;

static CLEANUP_HOOK: OnceLock<CleanupHook> = OnceLock::new();

/// Installs `SIGINT`/`SIGTERM` handling for the remainder of the process's
/// lifetime. `cleanup` is an opaque hook (e.g. "remove the in-progress
/// output folder", "close the report socket") invoked once before exit.
///
/// Per invariant 6, the raw OS signal disposition only ever flips an
/// `AtomicBool` (via `signal_hook::flag::register`, itself async-signal-safe).
/// A plain background thread — not the signal handler — polls that flag and
/// performs the actual cleanup, UI-child SIGKILL, and `exit`, so none of
/// that work ever runs inside unsafe signal-handler context.
pub fn install_signal_handlers(cleanup: impl Fn() + Send + Sync + 'static) -> Result<(), ProcessError> {
    let _ = CLEANUP_HOOK.set(Box::new(cleanup));

    let interrupted = Arc::new(AtomicBool::new(false));
    let terminated = Arc::new(AtomicBool::new(false));

    signal_hook::flag::register(signal_hook::consts::SIGINT, interrupted.clone())
        .map_err(|e| ProcessError::Spawn { program: "SIGINT handler".to_string(), source: e })?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, terminated.clone())
        .map_err(|e| ProcessError::Spawn { program: "SIGTERM handler".to_string(), source: e })?;

    thread::spawn(move || loop {
        if interrupted.load(Ordering::SeqCst) {
            run_cleanup_and_exit(1);
        }
        if terminated.load(Ordering::SeqCst) {
            run_cleanup_and_exit(0);
        }
        thread::sleep(Duration::from_millis(50));
    });

    Ok(())
}

fn run_cleanup_and_exit(code: i32) -> ! {
    if let Some(hook) = CLEANUP_HOOK.get() {
        hook();
    }
    let ui_pid = UI_PID.load(Ordering::SeqCst);
    if ui_pid != 0 {
        kill(ui_pid, libc::SIGKILL);
    }
    std::process::exit(code);
}

/// Checks whether `pid` currently refers to a live process, via the
/// `kill(pid, 0)` existence-check idiom.
pub fn is_pid_alive(pid: u32) -> bool {
    // SAFETY: signal 0 delivers nothing, only checks existence/permission.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

// ---------------------------------------------------------------------------
// Core process lifecycle (§4.4 `start_core_process` / `stop_core`)
// ---------------------------------------------------------------------------

/// Launches the db-backend core process, per spec.md §4.4:
/// `start_core_process(trace_id, record_core, caller_pid, test) -> ProcessHandle`.
pub fn start_core_process(
    paths: &Paths,
    trace_id: i64,
    record_core: bool,
    caller_pid: u32,
    test: bool,
) -> Result<Child, ProcessError> {
    let core_exe = paths.links_dir.join("db-backend");
    let log_path = paths.ensure_log_path("core", std::process::id());

    let spec = SpawnSpec::new(vec![
        core_exe.display().to_string(),
        trace_id.to_string(),
        record_core.to_string(),
        caller_pid.to_string(),
        test.to_string(),
        log_path.display().to_string(),
    ])
    .stdio(StdioPolicy::Discard);

    let child = spawn(&spec)?;
    set_core_pid(child.id());
    Ok(child)
}

/// Stops the core process per spec.md §4.4: `SIGTERM` when the db-backend
/// is not itself recording (it can exit immediately), `SIGINT` when it is
/// (so it gets a chance to flush), then waits for exit either way.
pub fn stop_core(mut child: Child, record_core: bool) -> Result<i32, ProcessError> {
    let signal = if record_core { libc::SIGINT } else { libc::SIGTERM };
    kill(child.id(), signal);
    let code = wait_mut(&mut child)?;
    clear_core_pid();
    Ok(code)
}

fn wait_mut(child: &mut Child) -> Result<i32, ProcessError> {
    let status = child.wait().map_err(ProcessError::Wait)?;
    Ok(status.code().unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_to_completion_succeeds_for_true() {
        let spec = SpawnSpec::new(vec!["true".to_string()]).stdio(StdioPolicy::Discard);
        run_to_completion(&spec).unwrap();
    }

    #[test]
    fn run_to_completion_fails_for_false() {
        let spec = SpawnSpec::new(vec!["false".to_string()]).stdio(StdioPolicy::Discard);
        let err = run_to_completion(&spec).unwrap_err();
        assert!(matches!(err, ProcessError::NonZeroExit(_)));
    }

    #[test]
    fn line_stream_forwards_stdout_lines() {
        let spec = SpawnSpec::new(vec![
            "printf".to_string(),
            "a\\nb\\nc\\n".to_string(),
        ]);
        let (child, rx) = spawn_with_line_stream(spec).unwrap();
        let lines: Vec<String> = rx.iter().collect();
        assert_eq!(lines, vec!["a", "b", "c"]);
        wait(child).unwrap();
    }

    #[test]
    fn current_process_is_alive() {
        assert!(is_pid_alive(std::process::id()));
    }

    #[test]
    fn ui_pid_registry_round_trips() {
        set_ui_pid(4242);
        assert_eq!(UI_PID.load(Ordering::SeqCst), 4242);
        clear_ui_pid();
        assert_eq!(UI_PID.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn env_merge_is_case_insensitive_last_write_wins() {
        let spec = SpawnSpec::new(vec!["true".to_string()])
            .env("Path", "/first")
            .env("PATH", "/second");
        assert_eq!(spec.env.len(), 1);
        let (key, value) = spec.env.values().next().unwrap();
        assert_eq!(key, "PATH");
        assert_eq!(value, "/second");
    }
}
