//! Forward-only migration runner.
//!
//! Applies `*.sql` scripts from a directory in ascending filename order,
//! each inside its own transaction, and records every applied filename in
//! a `_migrations` bookkeeping table so reruns are zero-write no-ops. The
//! runner has no semantic understanding of script contents; filenames must
//! sort into dependency order (numeric prefix convention).

use std::fs;
use std::path::Path;

use rusqlite::Connection;

use super::DatabaseError;

const MIGRATION_EXTENSION: &str = "sql";

/// Run all pending migration scripts from `dir` against `conn`.
///
/// A missing directory is a legitimate "no migrations" state, not an
/// error. The first failing script rolls back and aborts the run: later
/// scripts are never attempted on top of partial schema state.
///
/// Returns the number of newly applied scripts.
pub fn run_migrations(conn: &Connection, dir: &Path) -> Result<usize, DatabaseError> {
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "migrations directory absent, skipping");
        return Ok(0);
    }

    ensure_bookkeeping_table(conn)?;

    let mut applied = 0;
    for filename in list_candidate_scripts(dir)? {
        if is_applied(conn, &filename)? {
            tracing::debug!(%filename, "migration already applied, skipping");
            continue;
        }

        let sql = fs::read_to_string(dir.join(&filename))?;
        let tx = conn.unchecked_transaction()?;
        tracing::info!(%filename, "applying migration");
        tx.execute_batch(&sql).map_err(|e| DatabaseError::MigrationFailed {
            filename: filename.clone(),
            reason: e.to_string(),
        })?;
        tx.execute("INSERT INTO _migrations (filename) VALUES (?1)", [&filename])?;
        tx.commit()?;
        applied += 1;
    }

    Ok(applied)
}

fn ensure_bookkeeping_table(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             filename TEXT UNIQUE NOT NULL,
             applied_at TEXT NOT NULL DEFAULT (datetime('now'))
         );",
    )?;
    Ok(())
}

/// Candidate script filenames, sorted ascending (application order).
fn list_candidate_scripts(dir: &Path) -> Result<Vec<String>, DatabaseError> {
    let mut files: Vec<String> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.path().extension().and_then(|e| e.to_str()) == Some(MIGRATION_EXTENSION)
        })
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    files.sort();
    Ok(files)
}

fn is_applied(conn: &Connection, filename: &str) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM _migrations WHERE filename = ?1",
        [filename],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Number of recorded migrations (for verification).
pub fn applied_count(conn: &Connection) -> Result<i64, DatabaseError> {
    ensure_bookkeeping_table(conn)?;
    let count = conn.query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0))?;
    Ok(count)
}
