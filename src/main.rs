//! CLI Dispatcher (C8): parses arguments, resolves `Paths`/`Config`/
//! `Catalog` once, installs signal handling, and dispatches to one
//! subcommand module per spec.md §4.8's table.

mod subcommands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use ct::catalog::Catalog;
use ct::config::Config;
use ct::error::CliError;
use ct::lang::Lang;
use ct::paths::Paths;
use ct::process;
use ct::recorder::{self, RecordRequest};
use ct::replay;

#[derive(Debug, Parser)]
#[command(
    name = "ct",
    about = "Records and replays program executions",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record the execution of a program.
    Record(RecordArgs),
    /// Record then replay a program, with the UI restart loop.
    Run(RunArgs),
    /// Replay a trace in the UI.
    Replay(ReplayArgs),
    /// Replay a trace in the terminal REPL.
    Console(ReplayArgs),
    /// Share a trace and print its composite remote key.
    Upload(ReplayArgs),
    /// List recorded traces.
    List(ListArgs),
    #[command(name = "trace-metadata")]
    /// Emit a single JSON value describing one or more traces.
    TraceMetadata(TraceMetadataArgs),
    #[command(name = "start_core")]
    /// Launch the core process standalone, without a UI.
    StartCore(StartCoreArgs),
    /// Unpack and register a previously-exported trace archive.
    Import(ImportArgs),
    /// Defer execution to an external `ct-*` binary.
    #[command(external_subcommand)]
    External(Vec<String>),
}

#[derive(Debug, clap::Args)]
pub struct RecordArgs {
    /// Override the language of the project.
    #[arg(short, long)]
    pub lang: Option<Lang>,
    /// Where to save the trace.
    #[arg(short = 'o', long = "output-folder")]
    pub output_folder: Option<String>,
    /// Also write a plain (unencrypted) zip archive of the trace here.
    #[arg(short = 'e', long = "export")]
    pub export_zip: Option<String>,
    /// Enable calltrace instrumentation.
    #[arg(short = 'c', long = "calltrace")]
    pub calltrace: bool,
    /// Tracer backend, for languages that support more than one (e.g. Noir).
    #[arg(long)]
    pub backend: Option<String>,
    /// Path to the program to record.
    pub program: String,
    /// Arguments to pass to the program.
    pub args: Vec<String>,
}

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct ReplayArgs {
    #[arg(long)]
    pub id: Option<i64>,
    #[arg(short = 't', long = "trace-folder")]
    pub trace_folder: Option<String>,
    #[arg(
        short = 'i',
        long = "interactive",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub interactive: Option<bool>,
    #[arg(long)]
    pub test: bool,
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ListScope {
    Local,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Text,
    Json,
}

#[derive(Debug, clap::Args)]
pub struct ListArgs {
    pub scope: Option<ListScope>,
    #[arg(long, value_enum, default_value = "text")]
    pub format: Format,
}

#[derive(Debug, clap::Args)]
pub struct TraceMetadataArgs {
    #[arg(long)]
    pub id: Option<i64>,
    #[arg(long)]
    pub path: Option<String>,
    #[arg(long)]
    pub program: Option<String>,
    #[arg(short = 'r', long = "rec-for-pid")]
    pub record_pid: Option<i64>,
    #[arg(long)]
    pub recent: bool,
    #[arg(long)]
    pub limit: Option<i64>,
    #[arg(long)]
    pub test: bool,
}

#[derive(Debug, clap::Args)]
pub struct StartCoreArgs {
    pub trace_arg: String,
    pub caller_pid: i64,
    #[arg(long)]
    pub test: bool,
}

#[derive(Debug, clap::Args)]
pub struct ImportArgs {
    pub zip: String,
    pub output_dir: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let paths = Paths::resolve();
    if let Err(e) = paths.ensure_dirs() {
        eprintln!("warning: could not create working directories: {e}");
    }
    ct::logging::init(&paths);

    let config = match Config::load(&paths) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(1);
        }
    };
    let catalog = match Catalog::open(&paths) {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = process::install_signal_handlers(|| {
        log::info!("interrupted, cleaning up");
    }) {
        log::warn!("could not install signal handlers: {e}");
    }

    let caller_pid = std::process::id();

    match dispatch(&paths, &config, &catalog, caller_pid, args.command) {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code().clamp(0, 255) as u8)
        }
    }
}

fn dispatch(
    paths: &Paths,
    config: &Config,
    catalog: &Catalog,
    caller_pid: u32,
    command: Option<Command>,
) -> Result<i32, CliError> {
    match command {
        None => Ok(replay::launch_ui_without_trace(paths, caller_pid, &[])?),
        Some(Command::Record(args)) => subcommands::record::run(paths, catalog, &args),
        Some(Command::Run(args)) => run_record_then_replay(paths, catalog, caller_pid, args),
        Some(Command::Replay(args)) => subcommands::replay::run_replay(paths, catalog, caller_pid, &args),
        Some(Command::Console(args)) => subcommands::replay::run_console(paths, catalog, caller_pid, &args),
        Some(Command::Upload(args)) => subcommands::replay::run_upload(catalog, config, &args),
        Some(Command::List(args)) => subcommands::list::run(catalog, &args),
        Some(Command::TraceMetadata(args)) => subcommands::trace_metadata::run(catalog, &args),
        Some(Command::StartCore(args)) => subcommands::start_core::run(paths, catalog, &args),
        Some(Command::Import(args)) => subcommands::import::run(paths, catalog, &args),
        Some(Command::External(argv)) => subcommands::external::run_external(&argv),
    }
}

/// `run`: record then replay the freshly-recorded trace, with the UI
/// restart loop (spec.md §4.8) — `replay::launch_ui` already implements the
/// `RESTART_EXIT_CODE` loop, so this just chains record into it.
fn run_record_then_replay(
    paths: &Paths,
    catalog: &Catalog,
    caller_pid: u32,
    args: RunArgs,
) -> Result<i32, CliError> {
    let request = RecordRequest {
        program: args.program,
        args: args.args,
        backend: None,
        lang_override: Lang::Unknown,
        output_folder: None,
        trace_id: None,
    };
    let trace = recorder::record(paths, catalog, request, false)?;
    Ok(replay::launch_ui(paths, &trace, caller_pid, false, false, &[])?)
}
