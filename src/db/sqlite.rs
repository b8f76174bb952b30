//! Connection opening and startup preparation for the two stores.
//!
//! The personal store holds identifiable case data; the study store holds
//! anonymized aggregates only. They are independently versioned: each has
//! its own migration directory and `_migrations` bookkeeping. No global
//! handles — callers own the connections and pass them into the
//! repository/aggregation functions.

use std::fs;
use std::path::Path;

use rusqlite::Connection;

use super::{drift, migrations, DatabaseError};
use crate::config::StorageConfig;

/// Both prepared stores, opened once at process startup.
pub struct Databases {
    pub personal: Connection,
    pub study: Connection,
}

/// Open and prepare both stores per the given layout.
pub fn open_databases(config: &StorageConfig) -> Result<Databases, DatabaseError> {
    if let Some(parent) = config.personal_db.parent() {
        fs::create_dir_all(parent)?;
    }
    if let Some(parent) = config.study_db.parent() {
        fs::create_dir_all(parent)?;
    }

    let personal = open_personal_database(&config.personal_db, &config.personal_migrations)?;
    let study = open_study_database(&config.study_db, &config.study_migrations)?;
    Ok(Databases { personal, study })
}

/// Open the personal store: pragmas, migrations, then drift repair.
pub fn open_personal_database(
    path: &Path,
    migrations_dir: &Path,
) -> Result<Connection, DatabaseError> {
    let conn = Connection::open(path)?;
    configure_pragmas(&conn)?;
    migrations::run_migrations(&conn, migrations_dir)?;
    repair_personal_schema(&conn)?;
    Ok(conn)
}

/// Open the study store: pragmas and migrations only.
pub fn open_study_database(
    path: &Path,
    migrations_dir: &Path,
) -> Result<Connection, DatabaseError> {
    let conn = Connection::open(path)?;
    configure_pragmas(&conn)?;
    migrations::run_migrations(&conn, migrations_dir)?;
    Ok(conn)
}

/// Open an in-memory personal store with the bundled schema (for testing).
pub fn open_memory_personal_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    migrations::run_migrations(&conn, &crate::config::bundled_migrations_dir("personal"))?;
    repair_personal_schema(&conn)?;
    Ok(conn)
}

/// Open an in-memory study store with the bundled schema (for testing).
pub fn open_memory_study_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    migrations::run_migrations(&conn, &crate::config::bundled_migrations_dir("study"))?;
    Ok(conn)
}

/// WAL so external read-only inspection tools never block the single
/// writer; foreign keys on for the client → case → session chain.
fn configure_pragmas(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}

/// Additive repair for `cases`/`sessions` columns that historically
/// appeared through ad hoc patches outside the migration history.
fn repair_personal_schema(conn: &Connection) -> Result<(), DatabaseError> {
    drift::add_column_if_missing(conn, "cases", "target_description TEXT")?;
    drift::add_column_if_missing(conn, "cases", "sud_start REAL")?;
    drift::add_column_if_missing(conn, "cases", "problem_since_month TEXT")?;
    drift::add_column_if_missing(conn, "cases", "problem_duration_months INTEGER")?;
    drift::add_column_if_missing(conn, "cases", "age_years_at_start INTEGER")?;
    drift::add_column_if_missing(conn, "cases", "closed_at TEXT")?;
    drift::add_column_if_missing(conn, "sessions", "method_code TEXT")?;
    Ok(())
}

/// Count tables in a database (for verification).
pub fn count_tables(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}
