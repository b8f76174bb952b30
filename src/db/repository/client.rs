use std::str::FromStr;

use chrono::{Local, NaiveDate};
use rusqlite::{params, Connection};

use super::{case, require_text};
use crate::db::DatabaseError;
use crate::models::{Client, ClientUpdate, Gender, NewClient};

/// Insert a new client. When the payload carries a non-empty intake
/// block, a first case is opened in the same transaction.
pub fn insert_client(conn: &Connection, payload: &NewClient) -> Result<i64, DatabaseError> {
    let full_name = require_text(&payload.full_name, "full_name")?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO clients (full_name, gender, dob, contact) VALUES (?1, ?2, ?3, ?4)",
        params![
            full_name,
            payload.gender.as_str(),
            payload.dob.map(|d| d.to_string()),
            payload.contact,
        ],
    )?;
    let client_id = tx.last_insert_rowid();

    if let Some(intake) = payload.intake.as_ref().filter(|i| i.has_content()) {
        tx.execute(
            "INSERT INTO cases (client_id, method_code, primary_problem_code, start_date, age_years_at_start)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                client_id,
                intake.method_code.as_deref().unwrap_or(case::DEFAULT_METHOD_CODE),
                intake
                    .primary_problem_code
                    .as_deref()
                    .unwrap_or(case::DEFAULT_PROBLEM_CODE),
                Local::now().date_naive().to_string(),
                intake.age_years_at_start,
            ],
        )?;
    }

    tx.commit()?;
    Ok(client_id)
}

pub fn get_client(conn: &Connection, id: i64) -> Result<Option<Client>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, full_name, gender, dob, contact FROM clients WHERE id = ?1",
    )?;
    let result = stmt.query_row(params![id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
        ))
    });

    match result {
        Ok(raw) => Ok(Some(client_from_raw(raw)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_clients(conn: &Connection) -> Result<Vec<Client>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, full_name, gender, dob, contact
         FROM clients
         ORDER BY full_name COLLATE NOCASE",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
        ))
    })?;

    let mut clients = Vec::new();
    for row in rows {
        clients.push(client_from_raw(row?)?);
    }
    Ok(clients)
}

/// COALESCE semantics: absent payload fields keep their stored values.
pub fn update_client(conn: &Connection, payload: &ClientUpdate) -> Result<(), DatabaseError> {
    if let Some(name) = &payload.full_name {
        require_text(name, "full_name")?;
    }

    let changed = conn.execute(
        "UPDATE clients
            SET full_name = COALESCE(?2, full_name),
                gender    = COALESCE(?3, gender),
                dob       = COALESCE(?4, dob),
                contact   = COALESCE(?5, contact)
          WHERE id = ?1",
        params![
            payload.id,
            payload.full_name.as_deref().map(str::trim),
            payload.gender.map(|g| g.as_str()),
            payload.dob.map(|d| d.to_string()),
            payload.contact,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Client".into(),
            id: payload.id,
        });
    }
    Ok(())
}

/// Delete a client and everything hanging off it: session notes,
/// sessions, previous therapies, medications, cases, then the client
/// row. One transaction; child tables carry no ON DELETE CASCADE, so the
/// cleanup is explicit and ordered leaf-first.
pub fn delete_client_cascade(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM session_notes WHERE session_id IN
           (SELECT id FROM sessions WHERE case_id IN
             (SELECT id FROM cases WHERE client_id = ?1))",
        params![id],
    )?;
    tx.execute(
        "DELETE FROM sessions WHERE case_id IN (SELECT id FROM cases WHERE client_id = ?1)",
        params![id],
    )?;
    tx.execute(
        "DELETE FROM case_previous_therapies WHERE case_id IN
           (SELECT id FROM cases WHERE client_id = ?1)",
        params![id],
    )?;
    tx.execute(
        "DELETE FROM case_medications WHERE case_id IN
           (SELECT id FROM cases WHERE client_id = ?1)",
        params![id],
    )?;
    tx.execute("DELETE FROM cases WHERE client_id = ?1", params![id])?;
    let deleted = tx.execute("DELETE FROM clients WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Client".into(),
            id,
        });
    }
    tx.commit()?;
    Ok(())
}

fn client_from_raw(
    raw: (i64, String, String, Option<String>, Option<String>),
) -> Result<Client, DatabaseError> {
    let (id, full_name, gender, dob, contact) = raw;
    Ok(Client {
        id,
        full_name,
        gender: Gender::from_str(&gender)?,
        dob: dob.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        contact,
    })
}
