//! Trace Catalog (C2): a per-partition SQLite store for `Trace` rows.
//!
//! Grounded on `ct::db` (`CONNECTION_MUTEX`, the original `CREATE TABLE`
//! DDL), generalized into a full CRUD + migration layer per spec.md §4.2.

mod migrations;
mod row;

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use crate::lang::Lang;
use crate::paths::Paths;
use crate::trace::{CalltraceMode, Trace};

pub use migrations::MIGRATIONS;

#[derive(Debug)]
pub enum CatalogError {
    UnknownField(String),
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::UnknownField(field) => write!(f, "unknown trace field: {field}"),
            CatalogError::Sqlite(e) => write!(f, "catalog database error: {e}"),
            CatalogError::Io(e) => write!(f, "catalog i/o error: {e}"),
        }
    }
}

impl std::error::Error for CatalogError {}

impl From<rusqlite::Error> for CatalogError {
    fn from(e: rusqlite::Error) -> Self {
        CatalogError::Sqlite(e)
    }
}

/// One partition's connection (`test=false` or `test=true` each get their
/// own database file and independent ID space, per spec.md §3 invariant 2).
struct Partition {
    conn: Mutex<Connection>,
}

impl Partition {
    fn open(db_path: &PathBuf) -> Result<Partition, CatalogError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(CatalogError::Io)?;
        }
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |r| r.get(0))?;
        migrations::apply(&conn)?;
        Ok(Partition { conn: Mutex::new(conn) })
    }
}

/// Holds both catalog partitions and dispatches on the `test` flag, matching
/// the `(id, test)`-shaped contract of spec.md §4.2.
pub struct Catalog {
    local: Partition,
    test: Partition,
}

impl Catalog {
    pub fn open(paths: &Paths) -> Result<Catalog, CatalogError> {
        let local = Partition::open(&paths.trace_dir.join("trace_index.db"))?;
        let test = Partition::open(&paths.test_dir.join("trace_index.db"))?;
        Ok(Catalog { local, test })
    }

    fn partition(&self, test: bool) -> &Partition {
        if test { &self.test } else { &self.local }
    }

    /// Atomically increments and returns `trace_values.maxTraceID`.
    pub fn new_id(&self, test: bool) -> Result<i64, CatalogError> {
        let conn = self.partition(test).conn.lock().unwrap();
        let id: i64 = conn.query_row(
            "UPDATE trace_values SET maxTraceID = maxTraceID + 1 WHERE id = 0 RETURNING maxTraceID",
            [],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    /// Upserts the full row by `(id, test)` and returns the stored value.
    pub fn record_trace(&self, trace: &Trace, test: bool) -> Result<Trace, CatalogError> {
        let conn = self.partition(test).conn.lock().unwrap();
        row::upsert(&conn, trace)?;
        Ok(trace.clone())
    }

    /// Updates a single named field. Unknown field names fail fast.
    pub fn update_field(
        &self,
        id: i64,
        field: &str,
        value: &str,
        test: bool,
    ) -> Result<(), CatalogError> {
        let column = row::column_for_field(field).ok_or_else(|| CatalogError::UnknownField(field.to_string()))?;
        let conn = self.partition(test).conn.lock().unwrap();
        let sql = format!("UPDATE traces SET {column} = ?1 WHERE id = ?2");
        conn.execute(&sql, params![value, id])?;
        Ok(())
    }

    pub fn register_record_trace_id(&self, pid: i64, id: i64, test: bool) -> Result<(), CatalogError> {
        let conn = self.partition(test).conn.lock().unwrap();
        conn.execute(
            "INSERT INTO record_pid_trace_id_map (pid, trace_id) VALUES (?1, ?2)",
            params![pid, id],
        )?;
        Ok(())
    }

    pub fn find(&self, id: i64, test: bool) -> Result<Option<Trace>, CatalogError> {
        let conn = self.partition(test).conn.lock().unwrap();
        let result = conn
            .query_row("SELECT * FROM traces WHERE id = ?1", params![id], row::from_row)
            .optional()?;
        Ok(result)
    }

    /// Matches `outputFolder` with or without a trailing slash.
    pub fn find_by_path(&self, path: &str, test: bool) -> Result<Option<Trace>, CatalogError> {
        let trimmed = path.trim_end_matches('/');
        let with_slash = format!("{trimmed}/");
        let conn = self.partition(test).conn.lock().unwrap();
        let result = conn
            .query_row(
                "SELECT * FROM traces WHERE outputFolder = ?1 OR outputFolder = ?2",
                params![trimmed, with_slash],
                row::from_row,
            )
            .optional()?;
        Ok(result)
    }

    /// If `pattern` contains `#`, treats it as `<program-substring>#<downloadId>`
    /// (a composite remote lookup key distinct from the upload sharing key of
    /// spec.md §6/§9, which uses `//`). Otherwise does a substring match on
    /// `program` and returns the match with the largest `id`.
    pub fn find_by_program_pattern(&self, pattern: &str, test: bool) -> Result<Option<Trace>, CatalogError> {
        let conn = self.partition(test).conn.lock().unwrap();
        let (program_needle, download_id) = match pattern.split_once('#') {
            Some((program, download_id)) => (program, Some(download_id)),
            None => (pattern, None),
        };

        let mut stmt = if download_id.is_some() {
            conn.prepare(
                "SELECT * FROM traces WHERE program LIKE ?1 ESCAPE '\\' AND downloadId = ?2 ORDER BY id DESC LIMIT 1",
            )?
        } else {
            conn.prepare("SELECT * FROM traces WHERE program LIKE ?1 ESCAPE '\\' ORDER BY id DESC LIMIT 1")?
        };

        let escaped = program_needle.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        let like_needle = format!("%{escaped}%");
        let result = if let Some(download_id) = download_id {
            stmt.query_row(params![like_needle, download_id], row::from_row).optional()?
        } else {
            stmt.query_row(params![like_needle], row::from_row).optional()?
        };
        Ok(result)
    }

    pub fn find_by_record_process_id(&self, pid: i64, test: bool) -> Result<Option<Trace>, CatalogError> {
        let conn = self.partition(test).conn.lock().unwrap();
        let trace_id: Option<i64> = conn
            .query_row(
                "SELECT trace_id FROM record_pid_trace_id_map WHERE pid = ?1 ORDER BY rowid DESC LIMIT 1",
                params![pid],
                |r| r.get(0),
            )
            .optional()?;
        drop(conn);
        match trace_id {
            Some(id) => self.find(id, test),
            None => Ok(None),
        }
    }

    pub fn all(&self, test: bool) -> Result<Vec<Trace>, CatalogError> {
        let conn = self.partition(test).conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM traces ORDER BY id ASC")?;
        let rows = stmt.query_map([], row::from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(CatalogError::from)
    }

    pub fn find_recent(&self, limit: i64, test: bool) -> Result<Vec<Trace>, CatalogError> {
        let conn = self.partition(test).conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM traces ORDER BY id DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit], row::from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(CatalogError::from)
    }

    /// Clears the remote-sharing fields (spec.md §4.6 "Remote delete").
    pub fn clear_remote_sharing(&self, id: i64, test: bool) -> Result<(), CatalogError> {
        let conn = self.partition(test).conn.lock().unwrap();
        conn.execute(
            "UPDATE traces SET downloadId = '', controlId = '', key = '' WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }
}

/// A blank `Trace` with the given id, useful as a starting point before
/// filling in fields during recording/import.
pub fn new_trace(id: i64) -> Trace {
    Trace {
        id,
        program: String::new(),
        args: Vec::new(),
        compile_command: String::new(),
        env: String::new(),
        workdir: String::new(),
        lang: Lang::Unknown,
        output_folder: String::new(),
        source_folders: Vec::new(),
        low_level_folder: None,
        imported: false,
        shell_id: 0,
        rr_pid: 0,
        exit_code: 0,
        calltrace: false,
        calltrace_mode: CalltraceMode::NoInstrumentation,
        date: String::new(),
        download_id: String::new(),
        control_id: String::new(),
        key: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::Paths;

    fn test_paths() -> (tempfile::TempDir, Paths) {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Paths::resolve();
        paths.trace_dir = dir.path().join("traces");
        paths.test_dir = dir.path().join("test-traces");
        (dir, paths)
    }

    #[test]
    fn new_id_increases_strictly() {
        let (_dir, paths) = test_paths();
        let catalog = Catalog::open(&paths).unwrap();
        let a = catalog.new_id(false).unwrap();
        let b = catalog.new_id(false).unwrap();
        let c = catalog.new_id(false).unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn partitions_have_independent_id_spaces() {
        let (_dir, paths) = test_paths();
        let catalog = Catalog::open(&paths).unwrap();
        let local_first = catalog.new_id(false).unwrap();
        let test_first = catalog.new_id(true).unwrap();
        assert_eq!(local_first, test_first);
    }

    #[test]
    fn record_and_find_round_trip() {
        let (_dir, paths) = test_paths();
        let catalog = Catalog::open(&paths).unwrap();
        let id = catalog.new_id(false).unwrap();
        let mut trace = new_trace(id);
        trace.program = "/bin/echo".to_string();
        trace.args = vec!["hello".to_string(), "world".to_string()];
        trace.output_folder = "/tmp/trace-1".to_string();
        trace.lang = Lang::RubyDb;
        trace.calltrace_mode = CalltraceMode::FullRecord;

        catalog.record_trace(&trace, false).unwrap();
        let found = catalog.find(id, false).unwrap().unwrap();
        assert_eq!(found.program, trace.program);
        assert_eq!(found.args, trace.args);
        assert_eq!(found.output_folder, trace.output_folder);
        assert_eq!(found.lang, Lang::RubyDb);
        assert_eq!(found.calltrace_mode, CalltraceMode::FullRecord);
    }

    #[test]
    fn find_by_path_ignores_trailing_slash() {
        let (_dir, paths) = test_paths();
        let catalog = Catalog::open(&paths).unwrap();
        let id = catalog.new_id(false).unwrap();
        let mut trace = new_trace(id);
        trace.output_folder = "/tmp/trace-1".to_string();
        catalog.record_trace(&trace, false).unwrap();

        assert!(catalog.find_by_path("/tmp/trace-1", false).unwrap().is_some());
        assert!(catalog.find_by_path("/tmp/trace-1/", false).unwrap().is_some());
        assert!(catalog.find_by_path("/tmp/trace-2", false).unwrap().is_none());
    }

    #[test]
    fn find_by_program_pattern_returns_max_id() {
        let (_dir, paths) = test_paths();
        let catalog = Catalog::open(&paths).unwrap();
        for program in ["/bin/foo", "/usr/bin/foo", "/bin/bar"] {
            let id = catalog.new_id(false).unwrap();
            let mut trace = new_trace(id);
            trace.program = program.to_string();
            catalog.record_trace(&trace, false).unwrap();
        }
        let found = catalog.find_by_program_pattern("foo", false).unwrap().unwrap();
        assert_eq!(found.program, "/usr/bin/foo");
    }

    #[test]
    fn find_by_program_pattern_treats_underscore_as_a_literal() {
        let (_dir, paths) = test_paths();
        let catalog = Catalog::open(&paths).unwrap();
        for program in ["/bin/myXservice", "/bin/my_service"] {
            let id = catalog.new_id(false).unwrap();
            let mut trace = new_trace(id);
            trace.program = program.to_string();
            catalog.record_trace(&trace, false).unwrap();
        }
        // `_` is a single-char SQLite LIKE wildcard; it must be escaped so
        // this only matches the literal substring "my_service".
        let found = catalog.find_by_program_pattern("my_service", false).unwrap().unwrap();
        assert_eq!(found.program, "/bin/my_service");
    }

    #[test]
    fn update_field_rejects_unknown_field() {
        let (_dir, paths) = test_paths();
        let catalog = Catalog::open(&paths).unwrap();
        let id = catalog.new_id(false).unwrap();
        catalog.record_trace(&new_trace(id), false).unwrap();
        let err = catalog.update_field(id, "doesNotExist", "x", false).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownField(_)));
    }

    #[test]
    fn record_pid_map_last_write_wins() {
        let (_dir, paths) = test_paths();
        let catalog = Catalog::open(&paths).unwrap();
        let first = catalog.new_id(false).unwrap();
        let second = catalog.new_id(false).unwrap();
        catalog.record_trace(&new_trace(first), false).unwrap();
        catalog.record_trace(&new_trace(second), false).unwrap();

        catalog.register_record_trace_id(4242, first, false).unwrap();
        catalog.register_record_trace_id(4242, second, false).unwrap();

        let found = catalog.find_by_record_process_id(4242, false).unwrap().unwrap();
        assert_eq!(found.id, second);
    }

    #[test]
    fn all_sorted_ascending_find_recent_sorted_descending() {
        let (_dir, paths) = test_paths();
        let catalog = Catalog::open(&paths).unwrap();
        for _ in 0..3 {
            let id = catalog.new_id(false).unwrap();
            catalog.record_trace(&new_trace(id), false).unwrap();
        }
        let all = catalog.all(false).unwrap();
        let ids: Vec<i64> = all.iter().map(|t| t.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);

        let recent = catalog.find_recent(2, false).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].id > recent[1].id);
    }

    #[test]
    fn migrations_are_idempotent() {
        let (_dir, paths) = test_paths();
        let _catalog = Catalog::open(&paths).unwrap();
        // Re-opening re-runs `migrations::apply` against the same file.
        let catalog2 = Catalog::open(&paths).unwrap();
        let id = catalog2.new_id(false).unwrap();
        assert_eq!(id, 1);
    }
}
