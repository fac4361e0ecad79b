//! Shared fixtures for the integration suite: an isolated `Paths` rooted in
//! a fresh `TempDir` (so no test touches a real `$HOME`/`$XDG_*` location),
//! and a helper for dropping a fake executable in place of a real language
//! tracer / core / UI binary.

use std::path::Path;

use ct::paths::Paths;

pub fn isolated_paths() -> (tempfile::TempDir, Paths) {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Paths::resolve();
    paths.trace_dir = dir.path().join("traces");
    paths.test_dir = dir.path().join("test-traces");
    paths.tmp_dir = dir.path().join("tmp");
    paths.links_dir = dir.path().join("links");
    paths.share_dir = dir.path().join("share");
    std::fs::create_dir_all(&paths.links_dir).unwrap();
    std::fs::create_dir_all(paths.share_dir.join("electron")).unwrap();
    paths.ensure_dirs().unwrap();
    (dir, paths)
}

/// Writes a `#!/bin/sh` script to `path` and marks it executable.
pub fn write_executable_script(path: &Path, body: &str) {
    std::fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).unwrap();
    }
}
