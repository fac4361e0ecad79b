//! Trace Catalog (C2) integration scenarios: partition isolation and the
//! "recent traces" ordering the interactive replay menu depends on.

mod common;

use ct::catalog::{new_trace, Catalog};
use ct::lang::Lang;
use ct::trace::CalltraceMode;

#[test]
fn record_trace_round_trip_and_partition_isolation() {
    let (_dir, paths) = common::isolated_paths();
    let catalog = Catalog::open(&paths).unwrap();

    let local_id = catalog.new_id(false).unwrap();
    let mut trace = new_trace(local_id);
    trace.program = "/usr/bin/ruby".to_string();
    trace.args = vec!["script.rb".to_string(), "--flag".to_string()];
    trace.lang = Lang::RubyDb;
    trace.calltrace_mode = CalltraceMode::FullRecord;
    trace.output_folder = "/tmp/trace-x".to_string();
    catalog.record_trace(&trace, false).unwrap();

    let found = catalog.find(local_id, false).unwrap().unwrap();
    assert_eq!(found.program, trace.program);
    assert_eq!(found.args, trace.args);
    assert_eq!(found.lang, Lang::RubyDb);

    assert!(
        catalog.find(local_id, true).unwrap().is_none(),
        "the test partition must not see rows recorded in the local partition"
    );
}

#[test]
fn recent_traces_are_ordered_newest_first() {
    let (_dir, paths) = common::isolated_paths();
    let catalog = Catalog::open(&paths).unwrap();

    let mut ids = Vec::new();
    for i in 0..12 {
        let id = catalog.new_id(false).unwrap();
        let mut trace = new_trace(id);
        trace.program = format!("/bin/prog-{i}");
        catalog.record_trace(&trace, false).unwrap();
        ids.push(id);
    }

    // The replay menu asks for one more row than its display cap of 10, to
    // detect whether older traces were left out.
    let recent = catalog.find_recent(11, false).unwrap();
    assert_eq!(recent.len(), 11);
    assert_eq!(recent[0].id, *ids.last().unwrap());
    assert!(recent.windows(2).all(|w| w[0].id > w[1].id));
}

#[test]
fn find_by_program_pattern_ignores_percent_in_the_needle() {
    let (_dir, paths) = common::isolated_paths();
    let catalog = Catalog::open(&paths).unwrap();

    let id = catalog.new_id(false).unwrap();
    let mut trace = new_trace(id);
    trace.program = "/bin/100%-finished".to_string();
    catalog.record_trace(&trace, false).unwrap();

    let found = catalog.find_by_program_pattern("100%", false).unwrap().unwrap();
    assert_eq!(found.id, id);
}
