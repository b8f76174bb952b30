//! Aggregation engine: recomputes the anonymized method × problem ×
//! status statistics from the personal store and materializes them into
//! the study store.
//!
//! The derived table is fully replaced on every run (delete then bulk
//! insert, one transaction) — never merged. With no intervening
//! personal-store writes, two runs produce identical rows.

use std::str::FromStr;

use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::CaseStatus;

/// Per-case rollup joined with demographics, grouped by
/// method × problem × status. First/last SUD per case are picked by
/// (date, id) ascending/descending; the session-count average excludes
/// zero-session cases from its denominator; unmatched gender codes land
/// in the `u` bucket. SUD averages are rounded to 2 decimals, shares and
/// durations to 1 (presentation contract — grouping runs at full
/// precision). Groups with zero cases never appear.
const METHOD_PROBLEM_SQL: &str = "
WITH case_base AS (
  SELECT c.id AS case_id, c.client_id,
         c.method_code,
         c.primary_problem_code AS problem_code,
         CASE WHEN c.closed_at IS NULL THEN 'current' ELSE 'closed' END AS status
  FROM cases c
),
sr AS (
  SELECT s.case_id,
         COUNT(*) AS sessions_count,
         (SELECT sud_session FROM sessions s1
            WHERE s1.case_id = s.case_id
            ORDER BY s1.date ASC, s1.id ASC LIMIT 1) AS sud_start,
         (SELECT sud_session FROM sessions s2
            WHERE s2.case_id = s.case_id
            ORDER BY s2.date DESC, s2.id DESC LIMIT 1) AS sud_last
  FROM sessions s
  GROUP BY s.case_id
),
prev AS (
  SELECT cp.case_id,
         1 AS has_prev,
         SUM(COALESCE(cp.duration_months, 0)) AS prev_months
  FROM case_previous_therapies cp
  GROUP BY cp.case_id
),
gen AS (
  SELECT c.id AS case_id, cl.gender
  FROM cases c JOIN clients cl ON cl.id = c.client_id
),
per_case AS (
  SELECT
    cb.method_code, cb.problem_code, cb.status,
    g.gender,
    COALESCE(sr.sessions_count, 0) AS sessions_count,
    sr.sud_start, sr.sud_last,
    CASE WHEN sr.sud_start IS NOT NULL AND sr.sud_last IS NOT NULL
         THEN sr.sud_last - sr.sud_start END AS sud_delta,
    CASE WHEN p.has_prev IS NULL THEN 0 ELSE 1 END AS has_prev,
    COALESCE(p.prev_months, 0) AS prev_months
  FROM case_base cb
  LEFT JOIN sr ON sr.case_id = cb.case_id
  LEFT JOIN prev p ON p.case_id = cb.case_id
  LEFT JOIN gen g ON g.case_id = cb.case_id
),
agg AS (
  SELECT
    method_code, problem_code, status,
    COUNT(*) AS cases_count,
    SUM(sessions_count) AS sessions_count,
    AVG(NULLIF(sessions_count, 0)) AS avg_sessions,
    AVG(sud_start) AS avg_sud_start,
    AVG(sud_last) AS avg_sud_last,
    AVG(sud_delta) AS avg_sud_delta,
    AVG(has_prev) * 100.0 AS prev_therapies_share,
    AVG(prev_months * 1.0) AS prev_therapies_avg_months,
    SUM(CASE WHEN gender = 'm' THEN 1 ELSE 0 END) AS genders_m,
    SUM(CASE WHEN gender = 'w' THEN 1 ELSE 0 END) AS genders_w,
    SUM(CASE WHEN gender = 'd' THEN 1 ELSE 0 END) AS genders_d,
    SUM(CASE WHEN gender NOT IN ('m', 'w', 'd') OR gender IS NULL THEN 1 ELSE 0 END) AS genders_u
  FROM per_case
  GROUP BY method_code, problem_code, status
)
SELECT
  a.method_code,
  COALESCE((SELECT label FROM therapy_methods WHERE code = a.method_code), a.method_code) AS method_label,
  a.problem_code,
  COALESCE((SELECT label FROM problem_categories WHERE code = a.problem_code), a.problem_code) AS problem_label,
  a.status,
  a.cases_count, a.sessions_count, a.avg_sessions,
  ROUND(a.avg_sud_start, 2) AS avg_sud_start,
  ROUND(a.avg_sud_last, 2) AS avg_sud_last,
  ROUND(a.avg_sud_delta, 2) AS avg_sud_delta,
  ROUND(a.prev_therapies_share, 1) AS prev_therapies_share,
  ROUND(a.prev_therapies_avg_months, 1) AS prev_therapies_avg_months,
  a.genders_m, a.genders_w, a.genders_d, a.genders_u
FROM agg a
ORDER BY method_label COLLATE NOCASE, problem_label COLLATE NOCASE, status;
";

/// One materialized row of `study_agg_method_problem`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AggregateRow {
    pub method_code: String,
    pub method_label: String,
    pub problem_code: String,
    pub problem_label: String,
    pub status: CaseStatus,
    pub cases_count: i64,
    pub sessions_count: i64,
    pub avg_sessions: Option<f64>,
    pub avg_sud_start: Option<f64>,
    pub avg_sud_last: Option<f64>,
    pub avg_sud_delta: Option<f64>,
    pub prev_therapies_share: Option<f64>,
    pub prev_therapies_avg_months: Option<f64>,
    pub genders_m: i64,
    pub genders_w: i64,
    pub genders_d: i64,
    pub genders_u: i64,
}

/// Compute the aggregate rows from the personal store (read-only).
pub fn collect_aggregates(personal: &Connection) -> Result<Vec<AggregateRow>, DatabaseError> {
    let mut stmt = personal.prepare(METHOD_PROBLEM_SQL)?;
    let rows = stmt.query_map([], |row| {
        Ok((
            AggregateRow {
                method_code: row.get(0)?,
                method_label: row.get(1)?,
                problem_code: row.get(2)?,
                problem_label: row.get(3)?,
                status: CaseStatus::Current, // patched below from the raw code
                cases_count: row.get(5)?,
                sessions_count: row.get(6)?,
                avg_sessions: row.get(7)?,
                avg_sud_start: row.get(8)?,
                avg_sud_last: row.get(9)?,
                avg_sud_delta: row.get(10)?,
                prev_therapies_share: row.get(11)?,
                prev_therapies_avg_months: row.get(12)?,
                genders_m: row.get(13)?,
                genders_w: row.get(14)?,
                genders_d: row.get(15)?,
                genders_u: row.get(16)?,
            },
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut aggregates = Vec::new();
    for row in rows {
        let (mut aggregate, status) = row?;
        aggregate.status = CaseStatus::from_str(&status)?;
        aggregates.push(aggregate);
    }
    Ok(aggregates)
}

/// Recompute the study store's aggregate table from the personal store.
///
/// Delete-then-bulk-insert inside one transaction on the study side, so
/// readers see either the previous table or the new one, never a partial
/// mix. Returns the number of materialized rows.
pub fn refresh_study_aggregates(
    personal: &Connection,
    study: &Connection,
) -> Result<usize, DatabaseError> {
    let rows = collect_aggregates(personal)?;

    let tx = study.unchecked_transaction()?;
    tx.execute("DELETE FROM study_agg_method_problem", [])?;
    {
        let mut insert = tx.prepare(
            "INSERT INTO study_agg_method_problem
               (method_code, method_label, problem_code, problem_label, status,
                cases_count, sessions_count, avg_sessions,
                avg_sud_start, avg_sud_last, avg_sud_delta,
                prev_therapies_share, prev_therapies_avg_months,
                genders_m, genders_w, genders_d, genders_u)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        )?;
        for row in &rows {
            insert.execute(params![
                row.method_code,
                row.method_label,
                row.problem_code,
                row.problem_label,
                row.status.as_str(),
                row.cases_count,
                row.sessions_count,
                row.avg_sessions,
                row.avg_sud_start,
                row.avg_sud_last,
                row.avg_sud_delta,
                row.prev_therapies_share,
                row.prev_therapies_avg_months,
                row.genders_m,
                row.genders_w,
                row.genders_d,
                row.genders_u,
            ])?;
        }
    }
    tx.commit()?;

    tracing::info!(rows = rows.len(), "refreshed study aggregates");
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rusqlite::Connection;

    use super::*;
    use crate::db::repository::{case, client, session};
    use crate::db::sqlite::{open_memory_personal_database, open_memory_study_database};
    use crate::models::{
        AnamnesisPayload, Gender, NewCase, NewClient, NewSession, PreviousTherapy,
    };

    fn seed_client(conn: &Connection, name: &str, gender: Gender) -> i64 {
        client::insert_client(
            conn,
            &NewClient {
                full_name: name.into(),
                gender,
                dob: None,
                contact: None,
                intake: None,
            },
        )
        .unwrap()
    }

    fn seed_case(conn: &Connection, client_id: i64, method: &str, problem: &str) -> i64 {
        case::insert_case(
            conn,
            &NewCase {
                client_id,
                method_code: Some(method.into()),
                primary_problem_code: Some(problem.into()),
                start_date: NaiveDate::from_ymd_opt(2024, 1, 10),
                age_years_at_start: None,
            },
        )
        .unwrap()
    }

    fn seed_session(conn: &Connection, case_id: i64, day: u32, sud: f64) {
        session::insert_session(
            conn,
            &NewSession {
                case_id,
                date: NaiveDate::from_ymd_opt(2024, 2, day).unwrap().and_hms_opt(9, 0, 0),
                topic: None,
                sud_session: Some(sud),
                duration_min: None,
                method_code: None,
                note: None,
            },
        )
        .unwrap();
    }

    #[test]
    fn empty_store_yields_no_rows() {
        let personal = open_memory_personal_database().unwrap();
        let study = open_memory_study_database().unwrap();
        let inserted = refresh_study_aggregates(&personal, &study).unwrap();
        assert_eq!(inserted, 0);
        let count: i64 = study
            .query_row("SELECT COUNT(*) FROM study_agg_method_problem", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn open_and_closed_cases_split_by_status_and_gender() {
        let personal = open_memory_personal_database().unwrap();
        let study = open_memory_study_database().unwrap();

        let him = seed_client(&personal, "Er", Gender::Male);
        let her = seed_client(&personal, "Sie", Gender::Female);
        let _open_case = seed_case(&personal, him, "X", "Y");
        let closed_case = seed_case(&personal, her, "X", "Y");
        case::close_case(&personal, closed_case, None).unwrap();

        refresh_study_aggregates(&personal, &study).unwrap();
        let rows = collect_aggregates(&personal).unwrap();
        assert_eq!(rows.len(), 2);

        let current = rows.iter().find(|r| r.status == CaseStatus::Current).unwrap();
        let closed = rows.iter().find(|r| r.status == CaseStatus::Closed).unwrap();
        assert_eq!(current.cases_count, 1);
        assert_eq!((current.genders_m, current.genders_w), (1, 0));
        assert_eq!(closed.cases_count, 1);
        assert_eq!((closed.genders_m, closed.genders_w), (0, 1));

        // Unknown codes fall back to themselves as labels.
        assert_eq!(current.method_label, "X");
        assert_eq!(current.problem_label, "Y");
    }

    #[test]
    fn first_and_last_session_scores_drive_sud_columns() {
        let personal = open_memory_personal_database().unwrap();
        let client_id = seed_client(&personal, "Verlauf", Gender::Diverse);
        let case_id = seed_case(&personal, client_id, "X", "Y");
        seed_session(&personal, case_id, 1, 8.0);
        seed_session(&personal, case_id, 20, 3.0);

        let rows = collect_aggregates(&personal).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.avg_sud_start, Some(8.0));
        assert_eq!(row.avg_sud_last, Some(3.0));
        assert_eq!(row.avg_sud_delta, Some(-5.0));
        assert_eq!(row.sessions_count, 2);
        assert_eq!(row.avg_sessions, Some(2.0));
    }

    #[test]
    fn single_session_case_has_zero_delta() {
        let personal = open_memory_personal_database().unwrap();
        let client_id = seed_client(&personal, "Einmal", Gender::Unknown);
        let case_id = seed_case(&personal, client_id, "X", "Y");
        seed_session(&personal, case_id, 5, 6.0);

        let row = &collect_aggregates(&personal).unwrap()[0];
        assert_eq!(row.avg_sud_start, Some(6.0));
        assert_eq!(row.avg_sud_last, Some(6.0));
        assert_eq!(row.avg_sud_delta, Some(0.0));
    }

    #[test]
    fn same_day_sessions_tie_break_on_id() {
        let personal = open_memory_personal_database().unwrap();
        let client_id = seed_client(&personal, "Gleichtag", Gender::Male);
        let case_id = seed_case(&personal, client_id, "X", "Y");
        seed_session(&personal, case_id, 1, 9.0);
        seed_session(&personal, case_id, 1, 2.0);

        let row = &collect_aggregates(&personal).unwrap()[0];
        assert_eq!(row.avg_sud_start, Some(9.0));
        assert_eq!(row.avg_sud_last, Some(2.0));
    }

    #[test]
    fn zero_session_case_counts_but_skips_session_average() {
        let personal = open_memory_personal_database().unwrap();
        let client_id = seed_client(&personal, "Leer", Gender::Male);
        let with_sessions = seed_case(&personal, client_id, "X", "Y");
        let _without_sessions = seed_case(&personal, client_id, "X", "Y");
        seed_session(&personal, with_sessions, 1, 5.0);
        seed_session(&personal, with_sessions, 2, 4.0);

        let row = &collect_aggregates(&personal).unwrap()[0];
        assert_eq!(row.cases_count, 2);
        assert_eq!(row.sessions_count, 2);
        // Zero-session case is excluded from the denominator.
        assert_eq!(row.avg_sessions, Some(2.0));
    }

    #[test]
    fn prior_therapy_share_and_duration() {
        let personal = open_memory_personal_database().unwrap();
        let client_id = seed_client(&personal, "Vorbehandelt", Gender::Female);
        let with_history = seed_case(&personal, client_id, "X", "Y");
        let _fresh = seed_case(&personal, client_id, "X", "Y");

        case::save_anamnesis(
            &personal,
            &AnamnesisPayload {
                case_id: with_history,
                method_code: None,
                primary_problem_code: None,
                target_description: None,
                sud_start: None,
                problem_since_month: None,
                problem_duration_months: None,
                age_years_at_start: None,
                previous_therapies: vec![
                    PreviousTherapy {
                        therapy_type_code: "AMBULANT_VT".into(),
                        since_month: None,
                        duration_months: Some(10),
                        is_completed: true,
                        note: None,
                    },
                    PreviousTherapy {
                        therapy_type_code: "REHA".into(),
                        since_month: None,
                        duration_months: None, // missing duration counts as 0
                        is_completed: false,
                        note: None,
                    },
                ],
                medications: vec![],
            },
        )
        .unwrap();

        let row = &collect_aggregates(&personal).unwrap()[0];
        // One of two cases has any prior therapy.
        assert_eq!(row.prev_therapies_share, Some(50.0));
        // (10 + 0) for the treated case, 0 for the fresh one → mean 5.0
        assert_eq!(row.prev_therapies_avg_months, Some(5.0));
    }

    #[test]
    fn labels_resolve_from_catalogs_and_order_output() {
        let personal = open_memory_personal_database().unwrap();
        let client_id = seed_client(&personal, "Sortiert", Gender::Male);
        seed_case(&personal, client_id, "AUFLOESENDE_HYPNOSE", "ZWANG");
        seed_case(&personal, client_id, "AUFLOESENDE_HYPNOSE", "ANGST");
        seed_case(&personal, client_id, "EMDR", "ANGST");

        let rows = collect_aggregates(&personal).unwrap();
        let keys: Vec<(String, String)> = rows
            .iter()
            .map(|r| (r.method_label.clone(), r.problem_label.clone()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Auflösende Hypnose".to_string(), "Angst / Panik".to_string()),
                ("Auflösende Hypnose".to_string(), "Zwang".to_string()),
                ("EMDR".to_string(), "Angst / Panik".to_string()),
            ]
        );
    }

    #[test]
    fn refresh_is_deterministic_and_replaces_prior_contents() {
        let personal = open_memory_personal_database().unwrap();
        let study = open_memory_study_database().unwrap();

        let client_id = seed_client(&personal, "Stabil", Gender::Female);
        let case_id = seed_case(&personal, client_id, "X", "Y");
        seed_session(&personal, case_id, 3, 7.0);

        refresh_study_aggregates(&personal, &study).unwrap();
        let first = collect_aggregates(&personal).unwrap();
        refresh_study_aggregates(&personal, &study).unwrap();
        let second = collect_aggregates(&personal).unwrap();
        assert_eq!(first, second);

        // Table was replaced, not appended to.
        let count: i64 = study
            .query_row("SELECT COUNT(*) FROM study_agg_method_problem", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count as usize, first.len());

        // A primary-store change is reflected on the next refresh only.
        case::close_case(&personal, case_id, None).unwrap();
        refresh_study_aggregates(&personal, &study).unwrap();
        let status: String = study
            .query_row(
                "SELECT status FROM study_agg_method_problem LIMIT 1",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(status, "closed");
    }
}
