//! Replay Controller (C7) integration scenarios: target-resolution
//! priority against a real Catalog, and a single UI launch/stop pass
//! against fake core/UI executables.
//!
//! The multi-iteration `RESTART_EXIT_CODE` loop re-launches `ct replay
//! --id=<id>` via `std::env::current_exe()`, i.e. the real compiled `ct`
//! binary — that step is exercised manually/by the real binary rather than
//! here, since a test binary's own `current_exe()` isn't `ct` itself.

mod common;

use ct::catalog::{new_trace, Catalog};
use ct::replay::{self, ReplayTarget};

#[test]
fn resolve_prefers_id_over_pattern_against_a_real_catalog() {
    let (_dir, paths) = common::isolated_paths();
    let catalog = Catalog::open(&paths).unwrap();

    let id_a = catalog.new_id(false).unwrap();
    let mut trace_a = new_trace(id_a);
    trace_a.program = "/bin/alpha".to_string();
    catalog.record_trace(&trace_a, false).unwrap();

    let id_b = catalog.new_id(false).unwrap();
    let mut trace_b = new_trace(id_b);
    trace_b.program = "/bin/beta".to_string();
    catalog.record_trace(&trace_b, false).unwrap();

    let target = ReplayTarget::parse_cli(Some(id_a), None, Some("beta".to_string()));
    let resolved = replay::resolve(&catalog, target, false).unwrap();
    assert_eq!(resolved.id, id_a);
}

#[test]
fn resolve_by_pattern_falls_back_to_program_substring_match() {
    let (_dir, paths) = common::isolated_paths();
    let catalog = Catalog::open(&paths).unwrap();

    let id = catalog.new_id(false).unwrap();
    let mut trace = new_trace(id);
    trace.program = "/usr/local/bin/my-service".to_string();
    catalog.record_trace(&trace, false).unwrap();

    let target = ReplayTarget::parse_cli(None, None, Some("my-service".to_string()));
    let resolved = replay::resolve(&catalog, target, false).unwrap();
    assert_eq!(resolved.id, id);
}

#[test]
fn launch_ui_stops_the_core_and_forwards_the_ui_exit_code() {
    let (_dir, paths) = common::isolated_paths();
    let catalog = Catalog::open(&paths).unwrap();

    let id = catalog.new_id(false).unwrap();
    let mut trace = new_trace(id);
    trace.output_folder = paths.trace_dir.join(format!("trace-{id}")).display().to_string();
    catalog.record_trace(&trace, false).unwrap();

    // A core that ignores SIGTERM would hang `stop_core`'s wait forever;
    // the default `sh` disposition for SIGTERM is to terminate, so this
    // also exercises that `stop_core` actually signals the right pid.
    common::write_executable_script(&paths.links_dir.join("db-backend"), "while true; do sleep 0.05; done");
    common::write_executable_script(&paths.links_dir.join("electron"), "exit 7");

    let code = replay::launch_ui(&paths, &trace, std::process::id(), false, false, &[]).unwrap();
    assert_eq!(code, 7);
}
