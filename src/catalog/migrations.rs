//! Ordered, explicitly-versioned schema migrations (spec.md §4.2 "Schema
//! evolution", Design Note §9: "express as an ordered list of `(version,
//! statement)` pairs and record the highest applied version").
//!
//! The base schema below is deliberately the *historical* shape (a
//! `callgraph` column, no `calltraceMode`) so that [`MIGRATIONS`] has real
//! work to do on every fresh database, exactly mirroring the two concrete
//! migrations spec.md names as an example: renaming `callgraph` to
//! `calltrace` and adding `calltraceMode`.

use rusqlite::Connection;

use super::CatalogError;

const BASE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS traces (
    id INTEGER PRIMARY KEY,
    program TEXT NOT NULL DEFAULT '',
    args TEXT NOT NULL DEFAULT '',
    compileCommand TEXT NOT NULL DEFAULT '',
    env TEXT NOT NULL DEFAULT '',
    workdir TEXT NOT NULL DEFAULT '',
    lang INTEGER NOT NULL DEFAULT 10,
    outputFolder TEXT NOT NULL DEFAULT '',
    sourceFolders TEXT NOT NULL DEFAULT '',
    lowLevelFolder TEXT,
    imported INTEGER NOT NULL DEFAULT 0,
    shellID INTEGER NOT NULL DEFAULT 0,
    rrPid INTEGER NOT NULL DEFAULT 0,
    exitCode INTEGER NOT NULL DEFAULT 0,
    callgraph INTEGER NOT NULL DEFAULT 0,
    date TEXT NOT NULL DEFAULT '',
    downloadId TEXT NOT NULL DEFAULT '',
    controlId TEXT NOT NULL DEFAULT '',
    key TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS trace_values (
    id INTEGER PRIMARY KEY,
    maxTraceID INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS record_pid_trace_id_map (
    pid INTEGER NOT NULL,
    trace_id INTEGER NOT NULL
);
";

/// `(version, statement)` pairs, applied in order. Each statement is
/// idempotent in effect: re-running `apply` against an already-migrated
/// database is a no-op, both because the explicit `schemaVersion` counter
/// skips statements already recorded as applied, and because a statement
/// that somehow runs twice anyway (a database migrated by an older binary
/// that crashed mid-way) fails with an "already applied"-shaped SQLite
/// error that [`is_already_applied`] swallows.
pub const MIGRATIONS: &[(i64, &str)] = &[
    (1, "ALTER TABLE trace_values ADD COLUMN schemaVersion INTEGER NOT NULL DEFAULT 0"),
    (2, "ALTER TABLE traces RENAME COLUMN callgraph TO calltrace"),
    (3, "ALTER TABLE traces ADD COLUMN calltraceMode INTEGER NOT NULL DEFAULT 0"),
];

fn is_already_applied(err: &rusqlite::Error) -> bool {
    let msg = err.to_string();
    msg.contains("duplicate column name") || msg.contains("no such column")
}

/// Creates the base schema (if absent), seeds the `trace_values` singleton,
/// then applies every migration newer than the database's recorded
/// `schemaVersion`.
pub fn apply(conn: &Connection) -> Result<(), CatalogError> {
    conn.execute_batch(BASE_SCHEMA)?;
    conn.execute(
        "INSERT OR IGNORE INTO trace_values (id, maxTraceID) VALUES (0, 0)",
        [],
    )?;

    let current_version: i64 = conn
        .query_row(
            "SELECT schemaVersion FROM trace_values WHERE id = 0",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    for (version, statement) in MIGRATIONS {
        if *version <= current_version {
            continue;
        }
        match conn.execute(statement, []) {
            Ok(_) => {}
            Err(e) if is_already_applied(&e) => {
                log::debug!("migration {version} already applied: {e}");
            }
            Err(e) => return Err(CatalogError::from(e)),
        }
        conn.execute(
            "UPDATE trace_values SET schemaVersion = ?1 WHERE id = 0",
            rusqlite::params![version],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applying_twice_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        apply(&conn).unwrap();
        apply(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT schemaVersion FROM trace_values WHERE id = 0", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, MIGRATIONS.last().unwrap().0);
    }

    #[test]
    fn renamed_column_is_queryable() {
        let conn = Connection::open_in_memory().unwrap();
        apply(&conn).unwrap();
        conn.execute(
            "INSERT INTO traces (id, calltrace, calltraceMode) VALUES (1, 1, 2)",
            [],
        )
        .unwrap();
        let calltrace: i64 = conn
            .query_row("SELECT calltrace FROM traces WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(calltrace, 1);
    }
}
