//! Recorder (C5): allocates a trace id, prepares the output folder, invokes
//! the selected language tracer, and imports the result into the Catalog
//! (spec.md §4.5).

use std::env;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::catalog::{Catalog, CatalogError};
use crate::import_export::{self, ImportExportError};
use crate::lang::{detect_lang, Lang};
use crate::paths::Paths;
use crate::process::{self, ProcessError, SpawnSpec, StdioPolicy};
use crate::trace::Trace;

#[derive(Debug)]
pub enum RecorderError {
    ProgramNotFound(String),
    UnsupportedLanguage(Lang),
    UnsupportedBackend(String),
    TracerFailed(i32),
    Process(ProcessError),
    Catalog(CatalogError),
    ImportExport(ImportExportError),
    Io(std::io::Error),
}

impl std::fmt::Display for RecorderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecorderError::ProgramNotFound(p) => write!(f, "program not found: {p}"),
            RecorderError::UnsupportedLanguage(lang) => {
                write!(f, "unsupported language for recording: {}", lang.to_string())
            }
            RecorderError::UnsupportedBackend(b) => write!(f, "unsupported backend: {b}"),
            RecorderError::TracerFailed(code) => write!(f, "tracer exited with code {code}"),
            RecorderError::Process(e) => write!(f, "{e}"),
            RecorderError::Catalog(e) => write!(f, "{e}"),
            RecorderError::ImportExport(e) => write!(f, "{e}"),
            RecorderError::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for RecorderError {}

impl From<ProcessError> for RecorderError {
    fn from(e: ProcessError) -> Self {
        RecorderError::Process(e)
    }
}
impl From<CatalogError> for RecorderError {
    fn from(e: CatalogError) -> Self {
        RecorderError::Catalog(e)
    }
}
impl From<ImportExportError> for RecorderError {
    fn from(e: ImportExportError) -> Self {
        RecorderError::ImportExport(e)
    }
}
impl From<std::io::Error> for RecorderError {
    fn from(e: std::io::Error) -> Self {
        RecorderError::Io(e)
    }
}

/// Parameters for `record()`, mirroring the CLI's `record` subcommand.
pub struct RecordRequest {
    pub program: String,
    pub args: Vec<String>,
    pub backend: Option<String>,
    pub lang_override: Lang,
    pub output_folder: Option<String>,
    pub trace_id: Option<i64>,
}

/// Entry point: `record(program, args, backend, lang_override, output_folder?, traceId?)`
/// (spec.md §4.5, steps 1-9).
pub fn record(
    paths: &Paths,
    catalog: &Catalog,
    request: RecordRequest,
    test: bool,
) -> Result<Trace, RecorderError> {
    // 1. Allocate trace_id.
    let trace_id = match request.trace_id {
        Some(id) => id,
        None => catalog.new_id(test)?,
    };

    // 2. Resolve record_pid and register it.
    let record_pid: i64 = env::var("CODETRACER_WRAPPER_PID")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| std::process::id() as i64);
    catalog.register_record_trace_id(record_pid, trace_id, test)?;

    // 3. Determine output_folder.
    let binary_name = Path::new(&request.program)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "program".to_string());
    let output_folder: PathBuf = match &request.output_folder {
        Some(of) => PathBuf::from(of),
        None => match env::var("CODETRACER_SHELL_RECORDS_OUTPUT") {
            Ok(base) => PathBuf::from(base).join(format!("trace-{binary_name}-{trace_id}")),
            Err(_) => paths.trace_dir_for(test).join(format!("trace-{trace_id}")),
        },
    };
    std::fs::create_dir_all(&output_folder)?;
    std::fs::create_dir_all(output_folder.join("rr"))?;

    // 4. Expand program to an absolute path.
    let program_path = resolve_program_path(&request.program)
        .ok_or_else(|| RecorderError::ProgramNotFound(request.program.clone()))?;

    // 5. Detect language; reject Unknown / non-db-based.
    let lang = detect_lang(&program_path, request.lang_override);
    if !lang.is_db_based() {
        return Err(RecorderError::UnsupportedLanguage(lang));
    }

    // 6. Noir-only, non-fatal symbol pre-extraction.
    if lang == Lang::Noir {
        extract_noir_symbols(&program_path);
    }

    // Shell integration: best-effort "working" notice before the tracer runs.
    let session_id = env::var("CODETRACER_SESSION_ID").ok();
    if session_id.is_some() {
        report_shell_status("WorkingStatus", None, None);
    }

    // 7. Dispatch to the language-specific tracer.
    let spec = tracer_spawn_spec(lang, request.backend.as_deref(), &program_path, &request.args, &output_folder)?;
    let result = process::run_to_completion(&spec);

    match &result {
        Ok(()) => report_shell_status_if_session(&session_id, "OkStatus"),
        Err(_) => report_shell_status_if_session(&session_id, "ErrorStatus"),
    }
    let () = result.map_err(|e| match e {
        ProcessError::NonZeroExit(code) => RecorderError::TracerFailed(code),
        other => RecorderError::Process(other),
    })?;

    // 8-9. Import the emitted metadata and register in the Catalog.
    let trace = import_export::import_db_trace(
        paths,
        catalog,
        &output_folder,
        Some(output_folder.clone()),
        Some(trace_id),
        true,
        test,
    )?;

    Ok(trace)
}

/// Expands `program` to an absolute path: a direct file/dir wins, otherwise
/// search `PATH` for an executable.
fn resolve_program_path(program: &str) -> Option<PathBuf> {
    let direct = PathBuf::from(program);
    if direct.exists() {
        return std::fs::canonicalize(&direct).ok().or(Some(direct));
    }
    if let Some(paths) = env::var_os("PATH") {
        for dir in env::split_paths(&paths) {
            let candidate = dir.join(program);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

fn extract_noir_symbols(program_path: &Path) {
    let dir = if program_path.is_dir() { program_path } else { program_path.parent().unwrap_or(Path::new(".")) };
    let result = std::process::Command::new("ctags")
        .arg("-R")
        .current_dir(dir)
        .output();
    if let Err(e) = result {
        log::warn!("noir symbol pre-extraction (ctags) failed: {e}");
    }
}

fn tracer_spawn_spec(
    lang: Lang,
    backend: Option<&str>,
    program_path: &Path,
    user_args: &[String],
    output_folder: &Path,
) -> Result<SpawnSpec, RecorderError> {
    let trace_json = output_folder.join("trace.json");

    let (exe_env_var, mut argv, cwd): (&str, Vec<String>, Option<PathBuf>) = match lang {
        Lang::RubyDb => {
            // Base argv is `[ruby_tracer_path, program, ...userArgs]` run
            // under the `<ruby>` interpreter (spec.md §4.5) — the
            // interpreter and the tracer script are two distinct paths, so
            // unlike Small/Noir this needs a second env-derived value
            // before `exe` gets inserted as argv[0] below.
            let tracer_path = env::var("CODETRACER_RUBY_DB_TRACER_PATH").map_err(|_| {
                RecorderError::Process(ProcessError::ExecutableNotFound(
                    "CODETRACER_RUBY_DB_TRACER_PATH".to_string(),
                ))
            })?;
            let mut argv = vec![tracer_path, program_path.display().to_string()];
            argv.extend(user_args.iter().cloned());
            ("CODETRACER_RUBY_EXE_PATH", argv, None)
        }
        Lang::Small => {
            let mut argv = vec![program_path.display().to_string(), "--tracing".to_string()];
            argv.extend(user_args.iter().cloned());
            ("CODETRACER_SMALL_EXE_PATH", argv, None)
        }
        Lang::Noir => {
            let mut argv = vec!["trace".to_string(), "--trace-dir".to_string(), output_folder.display().to_string()];
            match backend {
                None | Some("acvm") => {}
                Some("plonky2") => argv.push("--trace-plonky2".to_string()),
                Some(other) => return Err(RecorderError::UnsupportedBackend(other.to_string())),
            }
            argv.extend(user_args.iter().cloned());
            let cwd = if program_path.is_dir() {
                program_path.to_path_buf()
            } else {
                program_path.parent().unwrap_or(Path::new(".")).to_path_buf()
            };
            ("CODETRACER_NOIR_EXE_PATH", argv, Some(cwd))
        }
        other => return Err(RecorderError::UnsupportedLanguage(other)),
    };

    let exe = env::var(exe_env_var).map_err(|_| {
        RecorderError::Process(ProcessError::ExecutableNotFound(exe_env_var.to_string()))
    })?;
    argv.insert(0, exe);

    let mut spec = SpawnSpec::new(argv)
        .env("CODETRACER_DB_TRACE_PATH", trace_json.display().to_string())
        .stdio(StdioPolicy::Inherit);
    if let Some(cwd) = cwd {
        spec = spec.cwd(cwd);
    }
    Ok(spec)
}

fn report_shell_status_if_session(session_id: &Option<String>, kind: &str) {
    if session_id.is_some() {
        report_shell_status(kind, None, None);
    }
}

/// Best-effort write of a `{WorkingStatus, OkStatus, ErrorStatus}`-tagged
/// JSON record to the shell's report socket (spec.md §4.5 "Shell
/// integration (optional)"). The wire schema on the other end is an
/// external collaborator's concern; failures here are logged at `debug!`
/// and never propagate, so `record` stays usable without a shell wrapper.
fn report_shell_status(kind: &str, first_line: Option<&str>, last_line: Option<&str>) {
    let Ok(socket_path) = env::var("CODETRACER_SHELL_REPORT_SOCKET") else {
        return;
    };
    let payload = json!({
        "type": kind,
        "firstLine": first_line,
        "lastLine": last_line,
    });
    match UnixStream::connect(&socket_path) {
        Ok(mut stream) => {
            use std::io::Write;
            if let Err(e) = writeln!(stream, "{payload}") {
                log::debug!("shell report socket write failed: {e}");
            }
        }
        Err(e) => log::debug!("shell report socket connect failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_program_path_finds_direct_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("script.rb");
        std::fs::write(&file, "# empty").unwrap();
        let resolved = resolve_program_path(file.to_str().unwrap()).unwrap();
        assert!(resolved.is_absolute());
    }

    #[test]
    fn resolve_program_path_fails_for_missing_file() {
        assert!(resolve_program_path("/definitely/does/not/exist.rb").is_none());
    }

    #[test]
    fn unsupported_backend_fails_fast_for_noir() {
        let dir = tempfile::tempdir().unwrap();
        let err = tracer_spawn_spec(Lang::Noir, Some("bogus"), dir.path(), &[], dir.path()).unwrap_err();
        assert!(matches!(err, RecorderError::UnsupportedBackend(_)));
    }

    #[test]
    fn ruby_db_argv_keeps_interpreter_and_tracer_script_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("script.rb");
        std::fs::write(&program, "# empty").unwrap();

        env::set_var("CODETRACER_RUBY_EXE_PATH", "/usr/bin/ruby");
        env::set_var("CODETRACER_RUBY_DB_TRACER_PATH", "/opt/codetracer/ruby_tracer.rb");

        let spec = tracer_spawn_spec(Lang::RubyDb, None, &program, &["--flag".to_string()], dir.path()).unwrap();

        env::remove_var("CODETRACER_RUBY_EXE_PATH");
        env::remove_var("CODETRACER_RUBY_DB_TRACER_PATH");

        assert_eq!(
            spec.argv,
            vec![
                "/usr/bin/ruby".to_string(),
                "/opt/codetracer/ruby_tracer.rb".to_string(),
                program.display().to_string(),
                "--flag".to_string(),
            ]
        );
    }
}
