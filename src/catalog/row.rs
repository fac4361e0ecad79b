//! Mapping between a `traces` row and [`Trace`], plus the allow-list behind
//! `update_field`'s free-form field name (spec.md §4.2).

use rusqlite::{params, Connection, Row};

use crate::lang::Lang;
use crate::trace::{CalltraceMode, Trace};

/// Every column `update_field` is allowed to touch, named exactly as the
/// spec.md §3 field / `trace_metadata.json` key. Returning the column name
/// verbatim (rather than building SQL from the caller's string directly)
/// is what makes the free-form `update_field(field: &str, ...)` contract
/// SQL-injection-safe.
pub fn column_for_field(field: &str) -> Option<&'static str> {
    const KNOWN: &[&str] = &[
        "program",
        "args",
        "compileCommand",
        "env",
        "workdir",
        "lang",
        "outputFolder",
        "sourceFolders",
        "lowLevelFolder",
        "imported",
        "shellID",
        "rrPid",
        "exitCode",
        "calltrace",
        "calltraceMode",
        "date",
        "downloadId",
        "controlId",
        "key",
    ];
    KNOWN.iter().copied().find(|known| *known == field)
}

/// Builds a `Trace` from a `SELECT * FROM traces` row.
pub fn from_row(row: &Row) -> rusqlite::Result<Trace> {
    let args_json: String = row.get("args")?;
    let source_folders_joined: String = row.get("sourceFolders")?;
    let lang_i64: i64 = row.get("lang")?;
    let calltrace_mode_i64: i64 = row.get("calltraceMode")?;

    Ok(Trace {
        id: row.get("id")?,
        program: row.get("program")?,
        args: serde_json::from_str(&args_json).unwrap_or_default(),
        compile_command: row.get("compileCommand")?,
        env: row.get("env")?,
        workdir: row.get("workdir")?,
        lang: Lang::from_i64(lang_i64),
        output_folder: row.get("outputFolder")?,
        source_folders: Trace::source_folders_from_joined(&source_folders_joined),
        low_level_folder: row.get("lowLevelFolder")?,
        imported: row.get::<_, i64>("imported")? != 0,
        shell_id: row.get("shellID")?,
        rr_pid: row.get("rrPid")?,
        exit_code: row.get("exitCode")?,
        calltrace: row.get::<_, i64>("calltrace")? != 0,
        calltrace_mode: CalltraceMode::from_i64(calltrace_mode_i64),
        date: row.get("date")?,
        download_id: row.get("downloadId")?,
        control_id: row.get("controlId")?,
        key: row.get("key")?,
    })
}

/// Upserts every field of `trace` by `id` (spec.md §4.2 `record_trace`:
/// "upsert by `(id, test)`. Writes all fields.").
pub fn upsert(conn: &Connection, trace: &Trace) -> rusqlite::Result<()> {
    let args_json = serde_json::to_string(&trace.args).unwrap_or_else(|_| "[]".to_string());
    let source_folders = trace.source_folders_joined();

    conn.execute(
        "INSERT INTO traces (
            id, program, args, compileCommand, env, workdir, lang, outputFolder,
            sourceFolders, lowLevelFolder, imported, shellID, rrPid, exitCode,
            calltrace, calltraceMode, date, downloadId, controlId, key
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20
        )
        ON CONFLICT(id) DO UPDATE SET
            program = excluded.program,
            args = excluded.args,
            compileCommand = excluded.compileCommand,
            env = excluded.env,
            workdir = excluded.workdir,
            lang = excluded.lang,
            outputFolder = excluded.outputFolder,
            sourceFolders = excluded.sourceFolders,
            lowLevelFolder = excluded.lowLevelFolder,
            imported = excluded.imported,
            shellID = excluded.shellID,
            rrPid = excluded.rrPid,
            exitCode = excluded.exitCode,
            calltrace = excluded.calltrace,
            calltraceMode = excluded.calltraceMode,
            date = excluded.date,
            downloadId = excluded.downloadId,
            controlId = excluded.controlId,
            key = excluded.key",
        params![
            trace.id,
            trace.program,
            args_json,
            trace.compile_command,
            trace.env,
            trace.workdir,
            trace.lang.to_i64(),
            trace.output_folder,
            source_folders,
            trace.low_level_folder,
            trace.imported as i64,
            trace.shell_id,
            trace.rr_pid,
            trace.exit_code,
            trace.calltrace as i64,
            trace.calltrace_mode.to_i64(),
            trace.date,
            trace.download_id,
            trace.control_id,
            trace.key,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_field_names() {
        assert!(column_for_field("nope").is_none());
        assert!(column_for_field("id").is_none());
        assert_eq!(column_for_field("calltraceMode"), Some("calltraceMode"));
    }
}
