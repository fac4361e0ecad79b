//! Process-wide logger setup, matching `backend-manager`'s
//! `log` + `flexi_logger` stack.

use flexi_logger::{FileSpec, Logger};

use crate::paths::Paths;

/// Initializes file-backed logging under `paths.tmp_dir/logs/ct-<pid>.log`.
/// Falls back to stderr-only logging if the log directory cannot be
/// created — logging setup failures must never be fatal.
pub fn init(paths: &Paths) {
    let log_dir = paths.tmp_dir.join("logs");
    let pid = std::process::id();

    let result = Logger::try_with_env_or_str("info")
        .and_then(|logger| {
            logger
                .log_to_file(
                    FileSpec::default()
                        .directory(&log_dir)
                        .basename("ct")
                        .discriminant(pid.to_string()),
                )
                .duplicate_to_stderr(flexi_logger::Duplicate::Warn)
                .start()
        });

    if let Err(err) = result {
        eprintln!("warning: could not initialize file logging: {err}");
    }
}
