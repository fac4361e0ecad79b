//! Importer/Exporter (C6) integration scenarios: sharing-disabled short
//! circuit and the path-traversal guard on self-contained import.

mod common;

use ct::catalog::{new_trace, Catalog};
use ct::config::Config;
use ct::import_export::{self, ImportExportError};
use ct::lang::Lang;
use ct::trace::CalltraceMode;

#[test]
fn upload_with_sharing_disabled_never_reaches_the_network() {
    let (_dir, paths) = common::isolated_paths();
    let output_folder = paths.trace_dir.join("trace-1");
    std::fs::create_dir_all(&output_folder).unwrap();

    let mut trace = new_trace(1);
    trace.program = "/usr/bin/ruby".to_string();
    trace.output_folder = output_folder.display().to_string();
    trace.lang = Lang::RubyDb;
    trace.calltrace_mode = CalltraceMode::FullRecord;

    // base_url/web_api_root are left empty: if this ever tried to make an
    // HTTP request it would fail on an invalid URL, not hang or succeed.
    let config = Config::default();
    assert!(!config.trace_sharing_enabled);

    let err = import_export::upload(&config, &trace).unwrap_err();
    assert!(matches!(err, ImportExportError::SharingDisabled));
}

#[test]
fn import_db_trace_never_writes_outside_its_output_folder() {
    let (_dir, paths) = common::isolated_paths();
    let catalog = Catalog::open(&paths).unwrap();

    let source_dir = paths.tmp_dir.join("record-in-progress");
    std::fs::create_dir_all(&source_dir).unwrap();

    let legit_file = paths.tmp_dir.join("project/main.rb");
    std::fs::create_dir_all(legit_file.parent().unwrap()).unwrap();
    std::fs::write(&legit_file, "puts 1").unwrap();

    std::fs::write(
        source_dir.join("trace_metadata.json"),
        format!(
            r#"{{"workdir":"{}","program":"{}","args":[]}}"#,
            paths.tmp_dir.display(),
            legit_file.display()
        ),
    )
    .unwrap();
    // One legitimate absolute path, one maliciously crafted one trying to
    // climb out of the trace directory via `..` components.
    std::fs::write(
        source_dir.join("trace_paths.json"),
        serde_json::to_string(&vec![
            legit_file.display().to_string(),
            "/../../etc/passwd".to_string(),
        ])
        .unwrap(),
    )
    .unwrap();

    let trace = import_export::import_db_trace(&paths, &catalog, &source_dir, None, None, true, false).unwrap();
    let target = std::path::PathBuf::from(&trace.output_folder);

    let embedded = target.join("files").join(legit_file.strip_prefix("/").unwrap());
    assert!(embedded.is_file(), "legitimate source file should be embedded under files/");

    assert!(
        !target.join("files/etc").exists(),
        "a path-traversal entry in trace_paths.json must never be copied"
    );
}

#[test]
fn encrypted_upload_payload_is_not_readable_as_plain_zip_bytes() {
    let password = import_export::generate_password();
    let data = b"totally not a zip file, just plaintext".to_vec();
    let encrypted = import_export::encrypt(&data, password.as_bytes()).unwrap();
    assert_ne!(encrypted, data);
    let decrypted = import_export::decrypt(&encrypted, password.as_bytes()).unwrap();
    assert_eq!(decrypted, data);
}
