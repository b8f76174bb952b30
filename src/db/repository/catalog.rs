use rusqlite::Connection;

use crate::db::DatabaseError;
use crate::models::{CatalogEntry, CatalogKind};

/// Entries of one reference catalog, ordered by display label.
/// Catalogs are read-only from the data layer's perspective; their
/// contents ship as seed migrations.
pub fn list_catalog(
    conn: &Connection,
    kind: CatalogKind,
) -> Result<Vec<CatalogEntry>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT code, label FROM {} ORDER BY label",
        kind.table_name()
    ))?;
    let rows = stmt.query_map([], |row| {
        Ok(CatalogEntry {
            code: row.get(0)?,
            label: row.get(1)?,
        })
    })?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}
