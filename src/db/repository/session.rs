use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension};

use super::validate_sud;
use crate::db::DatabaseError;
use crate::models::{NewSession, Session, SessionUpdate};

/// Insert a session; when a note is supplied, upsert the 1:1
/// `session_notes` row in the same transaction.
pub fn insert_session(conn: &Connection, payload: &NewSession) -> Result<i64, DatabaseError> {
    validate_sud(payload.sud_session, "sud_session")?;
    let date = payload.date.unwrap_or_else(|| Local::now().naive_local());

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO sessions (case_id, date, topic, sud_session, duration_min, method_code)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            payload.case_id,
            date,
            payload.topic,
            payload.sud_session,
            payload.duration_min,
            payload.method_code,
        ],
    )?;
    let session_id = tx.last_insert_rowid();

    if let Some(note) = &payload.note {
        tx.execute(
            "INSERT OR REPLACE INTO session_notes (session_id, content) VALUES (?1, ?2)",
            params![session_id, note],
        )?;
    }

    tx.commit()?;
    Ok(session_id)
}

/// Sessions for a case, newest first (date desc, id desc).
pub fn list_sessions_by_case(
    conn: &Connection,
    case_id: i64,
) -> Result<Vec<Session>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, case_id, date, topic, sud_session, duration_min, method_code
         FROM sessions WHERE case_id = ?1 ORDER BY date DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![case_id], |row| {
        Ok(Session {
            id: row.get(0)?,
            case_id: row.get(1)?,
            date: row.get(2)?,
            topic: row.get(3)?,
            sud_session: row.get(4)?,
            duration_min: row.get(5)?,
            method_code: row.get(6)?,
        })
    })?;
    let mut sessions = Vec::new();
    for row in rows {
        sessions.push(row?);
    }
    Ok(sessions)
}

/// Full overwrite of the editable fields (absent fields clear).
pub fn update_session(conn: &Connection, payload: &SessionUpdate) -> Result<(), DatabaseError> {
    validate_sud(payload.sud_session, "sud_session")?;
    let changed = conn.execute(
        "UPDATE sessions
            SET topic = ?2, sud_session = ?3, duration_min = ?4, method_code = ?5
          WHERE id = ?1",
        params![
            payload.id,
            payload.topic,
            payload.sud_session,
            payload.duration_min,
            payload.method_code,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Session".into(),
            id: payload.id,
        });
    }
    Ok(())
}

pub fn get_session_note(
    conn: &Connection,
    session_id: i64,
) -> Result<Option<String>, DatabaseError> {
    let note = conn
        .query_row(
            "SELECT content FROM session_notes WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(note)
}

/// Delete a session and its note row, one transaction.
pub fn delete_session(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM session_notes WHERE session_id = ?1", params![id])?;
    let deleted = tx.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Session".into(),
            id,
        });
    }
    tx.commit()?;
    Ok(())
}
