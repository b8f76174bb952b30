//! Additive schema-drift repair.
//!
//! Tolerates columns introduced outside the formal migration history
//! (ad hoc patches on live installations). Purely additive: never drops,
//! renames, or retypes anything, so it is safe to call unconditionally on
//! every startup. A safety net layered on top of the migration runner,
//! not a replacement for it.

use rusqlite::Connection;

use super::DatabaseError;

/// Ensure `table` has the column described by `column_def`
/// (e.g. `"closed_at TEXT"`), adding it if missing.
///
/// Only the column name is compared; type and default of an existing
/// column are trusted to match intent. If the table itself does not exist
/// yet, the call is a no-op — creating tables is the migration runner's job.
pub fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column_def: &str,
) -> Result<(), DatabaseError> {
    let column = match column_def.split_whitespace().next() {
        Some(name) => name,
        None => {
            return Err(DatabaseError::Validation(format!(
                "empty column definition for table {table}"
            )))
        }
    };

    let columns = table_columns(conn, table)?;
    if columns.is_empty() {
        tracing::debug!(table, "table absent, skipping drift repair");
        return Ok(());
    }

    if !columns.iter().any(|c| c == column) {
        conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column_def}"))?;
        tracing::info!(table, column, "added missing column");
    }
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn_with_table() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE cases (id INTEGER PRIMARY KEY);")
            .unwrap();
        conn
    }

    #[test]
    fn adds_missing_column_once() {
        let conn = conn_with_table();
        add_column_if_missing(&conn, "cases", "closed_at TEXT").unwrap();
        add_column_if_missing(&conn, "cases", "closed_at TEXT").unwrap();

        let cols = table_columns(&conn, "cases").unwrap();
        assert_eq!(cols.iter().filter(|c| c.as_str() == "closed_at").count(), 1);
    }

    #[test]
    fn existing_column_is_untouched() {
        let conn = conn_with_table();
        conn.execute_batch("ALTER TABLE cases ADD COLUMN sud_start REAL").unwrap();
        // Different declared type — name match alone decides.
        add_column_if_missing(&conn, "cases", "sud_start INTEGER DEFAULT 0").unwrap();

        let type_of: String = conn
            .query_row(
                "SELECT type FROM pragma_table_info('cases') WHERE name = 'sud_start'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(type_of, "REAL");
    }

    #[test]
    fn missing_table_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        add_column_if_missing(&conn, "cases", "closed_at TEXT").unwrap();
    }

    #[test]
    fn column_def_with_default_applies() {
        let conn = conn_with_table();
        add_column_if_missing(&conn, "cases", "flagged INTEGER NOT NULL DEFAULT 0").unwrap();
        conn.execute("INSERT INTO cases (id) VALUES (1)", []).unwrap();
        let flagged: i64 = conn
            .query_row("SELECT flagged FROM cases WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(flagged, 0);
    }
}
