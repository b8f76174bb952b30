use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};

use super::{require_text, validate_sud};
use crate::db::DatabaseError;
use crate::models::{AnamnesisPayload, Case, CaseDetail, CaseSummary, Medication, NewCase, PreviousTherapy};

pub const DEFAULT_METHOD_CODE: &str = "AUFLOESENDE_HYPNOSE";
pub const DEFAULT_PROBLEM_CODE: &str = "UNSPEC";

/// Non-negative whole-month difference between a "YYYY-MM" month and a
/// reference date (today when absent). `None` for unparseable input.
pub fn months_between_ym(since_month: &str, reference: Option<NaiveDate>) -> Option<i64> {
    let (year_str, month_str) = since_month.trim().split_once('-')?;
    let year: i64 = year_str.parse().ok()?;
    let month: i64 = month_str.parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }

    let reference = reference.unwrap_or_else(|| Local::now().date_naive());
    let diff = (reference.year() as i64 - year) * 12 + (reference.month() as i64 - month);
    Some(diff.max(0))
}

pub fn insert_case(conn: &Connection, payload: &NewCase) -> Result<i64, DatabaseError> {
    let start_date = payload
        .start_date
        .unwrap_or_else(|| Local::now().date_naive());
    conn.execute(
        "INSERT INTO cases (client_id, method_code, primary_problem_code, start_date, age_years_at_start)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            payload.client_id,
            payload.method_code.as_deref().unwrap_or(DEFAULT_METHOD_CODE),
            payload
                .primary_problem_code
                .as_deref()
                .unwrap_or(DEFAULT_PROBLEM_CODE),
            start_date.to_string(),
            payload.age_years_at_start,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_cases_by_client(
    conn: &Connection,
    client_id: i64,
) -> Result<Vec<CaseSummary>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, client_id, method_code, primary_problem_code, start_date, age_years_at_start
         FROM cases WHERE client_id = ?1 ORDER BY id DESC",
    )?;
    let rows = stmt.query_map(params![client_id], |row| {
        Ok(CaseSummary {
            id: row.get(0)?,
            client_id: row.get(1)?,
            method_code: row.get(2)?,
            primary_problem_code: row.get(3)?,
            start_date: row.get(4)?,
            age_years_at_start: row.get(5)?,
        })
    })?;
    let mut cases = Vec::new();
    for row in rows {
        cases.push(row?);
    }
    Ok(cases)
}

pub fn get_case(conn: &Connection, id: i64) -> Result<Option<Case>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, client_id, method_code, primary_problem_code, start_date,
                target_description, sud_start, problem_since_month,
                problem_duration_months, age_years_at_start, closed_at
         FROM cases WHERE id = ?1",
    )?;
    let result = stmt
        .query_row(params![id], |row| {
            Ok(Case {
                id: row.get(0)?,
                client_id: row.get(1)?,
                method_code: row.get(2)?,
                primary_problem_code: row.get(3)?,
                start_date: row.get(4)?,
                target_description: row.get(5)?,
                sud_start: row.get(6)?,
                problem_since_month: row.get(7)?,
                problem_duration_months: row.get(8)?,
                age_years_at_start: row.get(9)?,
                closed_at: row.get(10)?,
            })
        })
        .optional()?;
    Ok(result)
}

/// Full case read: the case row, its anamnesis child sets in stored
/// order, and the latest session SUD as `sud_current`.
pub fn get_case_detail(conn: &Connection, id: i64) -> Result<Option<CaseDetail>, DatabaseError> {
    let Some(case) = get_case(conn, id)? else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT therapy_type_code, since_month, duration_months, is_completed, note
         FROM case_previous_therapies WHERE case_id = ?1 ORDER BY id",
    )?;
    let previous_therapies = stmt
        .query_map(params![id], |row| {
            Ok(PreviousTherapy {
                therapy_type_code: row.get(0)?,
                since_month: row.get(1)?,
                duration_months: row.get(2)?,
                is_completed: row.get::<_, i64>(3)? != 0,
                note: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT med_code, since_month, dosage_note
         FROM case_medications WHERE case_id = ?1 ORDER BY id",
    )?;
    let medications = stmt
        .query_map(params![id], |row| {
            Ok(Medication {
                med_code: row.get(0)?,
                since_month: row.get(1)?,
                dosage_note: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let sud_current: Option<f64> = conn
        .query_row(
            "SELECT sud_session FROM sessions WHERE case_id = ?1
             ORDER BY date DESC, id DESC LIMIT 1",
            params![id],
            |row| row.get(0),
        )
        .optional()?
        .flatten();

    Ok(Some(CaseDetail {
        case,
        previous_therapies,
        medications,
        sud_current,
    }))
}

/// Save the anamnesis in one transaction: COALESCE update of the case
/// fields, then full replacement of the previous-therapy and medication
/// sets. The caller always submits the complete desired sets — an empty
/// list clears the table for this case.
///
/// `problem_duration_months`, when not supplied but `problem_since_month`
/// is, is derived against the case's start date.
pub fn save_anamnesis(conn: &Connection, payload: &AnamnesisPayload) -> Result<(), DatabaseError> {
    validate_sud(payload.sud_start, "sud_start")?;
    for therapy in &payload.previous_therapies {
        require_text(&therapy.therapy_type_code, "therapy_type_code")?;
    }
    for medication in &payload.medications {
        require_text(&medication.med_code, "med_code")?;
    }

    let tx = conn.unchecked_transaction()?;

    let start_date: Option<NaiveDate> = tx
        .query_row(
            "SELECT start_date FROM cases WHERE id = ?1",
            params![payload.case_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(start_date) = start_date else {
        return Err(DatabaseError::NotFound {
            entity_type: "Case".into(),
            id: payload.case_id,
        });
    };

    let derived_months = payload
        .problem_since_month
        .as_deref()
        .and_then(|m| months_between_ym(m, Some(start_date)));

    tx.execute(
        "UPDATE cases SET
            method_code             = COALESCE(?2, method_code),
            primary_problem_code    = COALESCE(?3, primary_problem_code),
            target_description      = COALESCE(?4, target_description),
            sud_start               = COALESCE(?5, sud_start),
            problem_since_month     = COALESCE(?6, problem_since_month),
            problem_duration_months = COALESCE(?7, problem_duration_months),
            age_years_at_start      = COALESCE(?8, age_years_at_start)
          WHERE id = ?1",
        params![
            payload.case_id,
            payload.method_code,
            payload.primary_problem_code,
            payload.target_description,
            payload.sud_start,
            payload.problem_since_month,
            payload.problem_duration_months.or(derived_months),
            payload.age_years_at_start,
        ],
    )?;

    tx.execute(
        "DELETE FROM case_previous_therapies WHERE case_id = ?1",
        params![payload.case_id],
    )?;
    for therapy in &payload.previous_therapies {
        tx.execute(
            "INSERT INTO case_previous_therapies
               (case_id, therapy_type_code, since_month, duration_months, is_completed, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                payload.case_id,
                therapy.therapy_type_code,
                therapy.since_month,
                therapy.duration_months,
                therapy.is_completed as i64,
                therapy.note,
            ],
        )?;
    }

    tx.execute(
        "DELETE FROM case_medications WHERE case_id = ?1",
        params![payload.case_id],
    )?;
    for medication in &payload.medications {
        tx.execute(
            "INSERT INTO case_medications (case_id, med_code, since_month, dosage_note)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                payload.case_id,
                medication.med_code,
                medication.since_month,
                medication.dosage_note,
            ],
        )?;
    }

    tx.commit()?;
    Ok(())
}

pub fn update_case_method(
    conn: &Connection,
    case_id: i64,
    method_code: &str,
) -> Result<(), DatabaseError> {
    let method_code = require_text(method_code, "method_code")?;
    let changed = conn.execute(
        "UPDATE cases SET method_code = ?2 WHERE id = ?1",
        params![case_id, method_code],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Case".into(),
            id: case_id,
        });
    }
    Ok(())
}

/// Close a case. Status is derived from `closed_at` alone, so this is the
/// only state transition a closure needs.
pub fn close_case(
    conn: &Connection,
    case_id: i64,
    closed_at: Option<NaiveDateTime>,
) -> Result<(), DatabaseError> {
    let closed_at = closed_at.unwrap_or_else(|| Local::now().naive_local());
    let changed = conn.execute(
        "UPDATE cases SET closed_at = ?2 WHERE id = ?1",
        params![case_id, closed_at],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Case".into(),
            id: case_id,
        });
    }
    Ok(())
}

pub fn reopen_case(conn: &Connection, case_id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE cases SET closed_at = NULL WHERE id = ?1",
        params![case_id],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Case".into(),
            id: case_id,
        });
    }
    Ok(())
}

/// Delete a case and its children (session notes, sessions, previous
/// therapies, medications) in one transaction, leaf-first.
pub fn delete_case_cascade(conn: &Connection, case_id: i64) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM session_notes WHERE session_id IN
           (SELECT id FROM sessions WHERE case_id = ?1)",
        params![case_id],
    )?;
    tx.execute("DELETE FROM sessions WHERE case_id = ?1", params![case_id])?;
    tx.execute(
        "DELETE FROM case_previous_therapies WHERE case_id = ?1",
        params![case_id],
    )?;
    tx.execute(
        "DELETE FROM case_medications WHERE case_id = ?1",
        params![case_id],
    )?;
    let deleted = tx.execute("DELETE FROM cases WHERE id = ?1", params![case_id])?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Case".into(),
            id: case_id,
        });
    }
    tx.commit()?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecalcOutcome {
    pub scanned: usize,
    pub changed: usize,
}

/// Maintenance sweep: recompute `problem_duration_months` from
/// `problem_since_month` for every case that declares one, updating only
/// rows whose stored value differs. One transaction.
pub fn recalc_problem_durations(conn: &Connection) -> Result<RecalcOutcome, DatabaseError> {
    let tx = conn.unchecked_transaction()?;

    let rows: Vec<(i64, NaiveDate, String)> = {
        let mut stmt = tx.prepare(
            "SELECT id, start_date, problem_since_month
             FROM cases WHERE problem_since_month IS NOT NULL",
        )?;
        let mapped = stmt.query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?;
        mapped.collect::<Result<Vec<_>, _>>()?
    };

    let mut changed = 0;
    for (id, start_date, since_month) in &rows {
        let new_months = months_between_ym(since_month, Some(*start_date));
        changed += tx.execute(
            "UPDATE cases SET problem_duration_months = ?2
              WHERE id = ?1 AND problem_duration_months IS NOT ?2",
            params![id, new_months],
        )?;
    }

    tx.commit()?;
    tracing::info!(scanned = rows.len(), changed, "recalculated problem durations");
    Ok(RecalcOutcome {
        scanned: rows.len(),
        changed,
    })
}
