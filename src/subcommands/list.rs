//! `ct list [local|remote] [--format text|json]` (spec.md §4.8).
//!
//! "remote" means traces that have already been shared (have a non-empty
//! `downloadId`), since this core does not implement a remote trace-listing
//! endpoint of its own (§6: the sharing protocol is consumed, not hosted).

use ct::catalog::Catalog;
use ct::error::CliError;
use ct::trace::Trace;

use crate::{Format, ListArgs, ListScope};

pub fn run(catalog: &Catalog, args: &ListArgs) -> Result<i32, CliError> {
    let all = catalog.all(false)?;
    let traces: Vec<Trace> = match args.scope.unwrap_or(ListScope::Local) {
        ListScope::Local => all,
        ListScope::Remote => all.into_iter().filter(|t| !t.download_id.is_empty()).collect(),
    };

    match args.format {
        Format::Json => {
            let json = serde_json::to_string_pretty(&traces)
                .map_err(|e| CliError::Environment(format!("cannot serialize trace list: {e}")))?;
            println!("{json}");
        }
        Format::Text => {
            println!("{:<5} {:<40} {:<10} {}", "id", "program", "lang", "date");
            for trace in &traces {
                println!(
                    "{:<5} {:<40} {:<10} {}",
                    trace.id,
                    trace.program,
                    trace.lang.to_string(),
                    trace.date
                );
            }
        }
    }
    Ok(0)
}
