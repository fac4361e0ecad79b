//! `ct import ZIP [OUTPUT_DIR]` (spec.md §4.8).

use std::path::{Path, PathBuf};

use ct::catalog::Catalog;
use ct::error::CliError;
use ct::import_export;
use ct::paths::Paths;

use crate::ImportArgs;

pub fn run(paths: &Paths, catalog: &Catalog, args: &ImportArgs) -> Result<i32, CliError> {
    let output_dir = args.output_dir.as_ref().map(PathBuf::from);
    let trace = import_export::import_zip(paths, catalog, Path::new(&args.zip), output_dir, false)?;
    println!("imported trace {} -> {}", trace.id, trace.output_folder);
    Ok(0)
}
