//! Resolution of the install/share/cache/tmp/trace/test directories (C1).
//!
//! Mirrors `backend-manager::paths::Paths`, generalized to cover every
//! directory the core needs instead of just a tmp path.

use std::env;
use std::path::PathBuf;
use std::sync::LazyLock;

/// All filesystem locations the core reads from or writes to.
///
/// Resolved once per process in [`Paths::resolve`] and then passed down
/// explicitly; nothing in the rest of the crate re-reads these environment
/// variables on its own.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Directory the tool was installed into. Fixed by the build in the
    /// real product; here it defaults to the running executable's directory.
    pub install_dir: PathBuf,
    /// Directory containing the running `ct` executable.
    pub exe_dir: PathBuf,
    /// Directory with bundled companion binaries (language tracers, UI, core).
    pub links_dir: PathBuf,
    /// `$XDG_DATA_HOME/codetracer` or `$HOME/.local/share/codetracer`.
    pub share_dir: PathBuf,
    /// Scratch directory for ephemeral files (archives in flight, sockets).
    pub tmp_dir: PathBuf,
    /// `share_dir/traces` — default home for recorded traces.
    pub trace_dir: PathBuf,
    /// Directory used for the `test=true` Catalog partition and its traces.
    pub test_dir: PathBuf,
    /// `$XDG_CONFIG_HOME/codetracer` or platform equivalent.
    pub config_dir: PathBuf,
}

impl Paths {
    /// Resolves every path from the environment. Fatal only in the sense
    /// that a caller who cannot create `share_dir` should treat that as an
    /// environment error (§7); `resolve` itself never fails.
    pub fn resolve() -> Paths {
        let exe_dir = env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));

        let home = env::var("HOME").unwrap_or_else(|_| "/".to_string());

        let share_dir = env::var("XDG_DATA_HOME")
            .map(|p| PathBuf::from(p).join("codetracer"))
            .unwrap_or_else(|_| PathBuf::from(&home).join(".local/share/codetracer"));

        let config_dir = env::var("XDG_CONFIG_HOME")
            .map(|p| PathBuf::from(p).join("codetracer"))
            .unwrap_or_else(|_| PathBuf::from(&home).join(".config/codetracer"));

        let tmp_dir = if cfg!(target_os = "macos") {
            PathBuf::from(&home).join("Library/Caches/com.codetracer.CodeTracer")
        } else {
            env::temp_dir().join("codetracer")
        };

        let trace_dir = env::var("CODETRACER_TRACE_FOLDER")
            .map(PathBuf::from)
            .unwrap_or_else(|_| share_dir.join("traces"));

        let test_dir = share_dir.join("test-traces");

        Paths {
            install_dir: exe_dir.clone(),
            links_dir: exe_dir.clone(),
            exe_dir,
            share_dir,
            tmp_dir,
            trace_dir,
            test_dir,
            config_dir,
        }
    }

    /// The directory traces for the given partition are stored under.
    pub fn trace_dir_for(&self, test: bool) -> &PathBuf {
        if test { &self.test_dir } else { &self.trace_dir }
    }

    /// Ensures every resolved directory exists, creating it if necessary.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.share_dir, &self.tmp_dir, &self.trace_dir, &self.test_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Path to a log file for the named component, under `tmp_dir/logs`.
    pub fn ensure_log_path(&self, component: &str, pid: u32) -> PathBuf {
        let dir = self.tmp_dir.join("logs");
        let _ = std::fs::create_dir_all(&dir);
        dir.join(format!("{component}-{pid}.log"))
    }
}

/// Process-wide resolved paths, computed lazily on first access.
pub static CODETRACER_PATHS: LazyLock<Paths> = LazyLock::new(Paths::resolve);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_dir_for_partition_differs() {
        let paths = Paths::resolve();
        assert_ne!(paths.trace_dir_for(true), paths.trace_dir_for(false));
    }
}
