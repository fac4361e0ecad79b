//! `ct record [--lang L] [-o DIR] [-e ZIP] [-c] [--backend B] PROGRAM [ARGS…]`
//! (spec.md §4.5/§4.8).

use std::path::Path;

use ct::catalog::Catalog;
use ct::error::CliError;
use ct::import_export;
use ct::lang::Lang;
use ct::paths::Paths;
use ct::recorder::{self, RecordRequest};

use crate::RecordArgs;

pub fn run(paths: &Paths, catalog: &Catalog, args: &RecordArgs) -> Result<i32, CliError> {
    let request = RecordRequest {
        program: args.program.clone(),
        args: args.args.clone(),
        backend: args.backend.clone(),
        lang_override: args.lang.unwrap_or(Lang::Unknown),
        output_folder: args.output_folder.clone(),
        trace_id: None,
    };

    let trace = recorder::record(paths, catalog, request, false)?;

    if args.calltrace {
        catalog.update_field(trace.id, "calltrace", "1", false)?;
    }

    if let Some(zip_path) = &args.export_zip {
        let bytes = import_export::zip_directory(Path::new(&trace.output_folder))?;
        std::fs::write(zip_path, bytes).map_err(ct::import_export::ImportExportError::from)?;
        println!("exported trace {} -> {zip_path}", trace.id);
    }

    println!("recorded trace {} -> {}", trace.id, trace.output_folder);
    Ok(0)
}
