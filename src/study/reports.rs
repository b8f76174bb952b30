//! Report reads over `v_method_problem_stats`.
//!
//! Both stores expose the view under the same name (the personal store
//! computes it live, the study store maps the materialized table), so
//! source selection is simply which connection the caller passes.

use std::str::FromStr;

use rusqlite::Connection;

use crate::db::DatabaseError;
use crate::models::CaseStatus;

/// One row of the shared statistics view. Gender columns are
/// percentages here, unlike the count columns of the materialized table.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StatRow {
    pub method_code: String,
    pub method_label: String,
    pub problem_code: String,
    pub problem_label: String,
    pub status: CaseStatus,
    pub cases_n: i64,
    pub avg_sessions: Option<f64>,
    pub avg_sud_start: Option<f64>,
    pub avg_sud_last: Option<f64>,
    pub avg_sud_delta: Option<f64>,
    pub pct_prev_therapies: Option<f64>,
    pub avg_prev_duration_mon: Option<f64>,
    pub pct_m: Option<f64>,
    pub pct_w: Option<f64>,
    pub pct_d: Option<f64>,
    pub pct_u: Option<f64>,
}

/// Read the statistics view, optionally filtered by case status.
pub fn method_problem_stats(
    conn: &Connection,
    status: Option<CaseStatus>,
) -> Result<Vec<StatRow>, DatabaseError> {
    let mut sql = String::from(
        "SELECT method_code, method_label, problem_code, problem_label, status,
                cases_n, avg_sessions, avg_sud_start, avg_sud_last, avg_sud_delta,
                pct_prev_therapies, avg_prev_duration_mon,
                pct_m, pct_w, pct_d, pct_u
         FROM v_method_problem_stats",
    );
    if status.is_some() {
        sql.push_str(" WHERE status = ?1");
    }
    sql.push_str(" ORDER BY method_label COLLATE NOCASE, problem_label COLLATE NOCASE, status");

    let mut stmt = conn.prepare(&sql)?;
    let map_row = |row: &rusqlite::Row<'_>| {
        Ok((
            StatRow {
                method_code: row.get(0)?,
                method_label: row.get(1)?,
                problem_code: row.get(2)?,
                problem_label: row.get(3)?,
                status: CaseStatus::Current, // patched below
                cases_n: row.get(5)?,
                avg_sessions: row.get(6)?,
                avg_sud_start: row.get(7)?,
                avg_sud_last: row.get(8)?,
                avg_sud_delta: row.get(9)?,
                pct_prev_therapies: row.get(10)?,
                avg_prev_duration_mon: row.get(11)?,
                pct_m: row.get(12)?,
                pct_w: row.get(13)?,
                pct_d: row.get(14)?,
                pct_u: row.get(15)?,
            },
            row.get::<_, String>(4)?,
        ))
    };

    let rows = match status {
        Some(status) => stmt.query_map([status.as_str()], map_row)?,
        None => stmt.query_map([], map_row)?,
    };

    let mut stats = Vec::new();
    for row in rows {
        let (mut stat, status_code) = row?;
        stat.status = CaseStatus::from_str(&status_code)?;
        stats.push(stat);
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rusqlite::Connection;

    use super::*;
    use crate::db::repository::{case, client};
    use crate::db::sqlite::{open_memory_personal_database, open_memory_study_database};
    use crate::models::{Gender, NewCase, NewClient};
    use crate::study::aggregation::refresh_study_aggregates;

    fn seed(personal: &Connection) -> i64 {
        let client_id = client::insert_client(
            personal,
            &NewClient {
                full_name: "Report Klientin".into(),
                gender: Gender::Female,
                dob: None,
                contact: None,
                intake: None,
            },
        )
        .unwrap();
        case::insert_case(
            personal,
            &NewCase {
                client_id,
                method_code: Some("EMDR".into()),
                primary_problem_code: Some("TRAUMA".into()),
                start_date: NaiveDate::from_ymd_opt(2024, 3, 1),
                age_years_at_start: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn personal_view_reports_live_data() {
        let personal = open_memory_personal_database().unwrap();
        seed(&personal);

        let stats = method_problem_stats(&personal, None).unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].method_label, "EMDR");
        assert_eq!(stats[0].cases_n, 1);
        assert_eq!(stats[0].pct_w, Some(100.0));
        assert_eq!(stats[0].pct_m, Some(0.0));
    }

    #[test]
    fn study_view_matches_personal_after_refresh() {
        let personal = open_memory_personal_database().unwrap();
        let study = open_memory_study_database().unwrap();
        seed(&personal);
        refresh_study_aggregates(&personal, &study).unwrap();

        let from_personal = method_problem_stats(&personal, None).unwrap();
        let from_study = method_problem_stats(&study, None).unwrap();
        assert_eq!(from_personal, from_study);
    }

    #[test]
    fn status_filter_narrows_rows() {
        let personal = open_memory_personal_database().unwrap();
        let case_id = seed(&personal);
        case::close_case(&personal, case_id, None).unwrap();
        seed(&personal); // second case stays open

        let all = method_problem_stats(&personal, None).unwrap();
        assert_eq!(all.len(), 2);

        let closed = method_problem_stats(&personal, Some(CaseStatus::Closed)).unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].status, CaseStatus::Closed);
    }
}
