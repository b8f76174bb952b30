use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub id: i64,
    pub client_id: i64,
    pub method_code: String,
    pub primary_problem_code: String,
    pub start_date: NaiveDate,
    pub target_description: Option<String>,
    pub sud_start: Option<f64>,
    /// "YYYY-MM" month the problem has been known since.
    pub problem_since_month: Option<String>,
    pub problem_duration_months: Option<i64>,
    pub age_years_at_start: Option<i64>,
    pub closed_at: Option<NaiveDateTime>,
}

/// Case list row (what the client screen shows).
#[derive(Debug, Clone, Serialize)]
pub struct CaseSummary {
    pub id: i64,
    pub client_id: i64,
    pub method_code: String,
    pub primary_problem_code: String,
    pub start_date: NaiveDate,
    pub age_years_at_start: Option<i64>,
}

/// Full case read: case row plus anamnesis children and the latest
/// session SUD score.
#[derive(Debug, Clone, Serialize)]
pub struct CaseDetail {
    #[serde(flatten)]
    pub case: Case,
    pub previous_therapies: Vec<PreviousTherapy>,
    pub medications: Vec<Medication>,
    pub sud_current: Option<f64>,
}

/// Prior treatment episode reported during intake. Full-replaced on
/// every anamnesis save, never patched row-by-row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviousTherapy {
    pub therapy_type_code: String,
    #[serde(default)]
    pub since_month: Option<String>,
    #[serde(default)]
    pub duration_months: Option<i64>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub note: Option<String>,
}

/// Reported medication. Same full-replace lifecycle as [`PreviousTherapy`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    pub med_code: String,
    #[serde(default)]
    pub since_month: Option<String>,
    #[serde(default)]
    pub dosage_note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCase {
    pub client_id: i64,
    #[serde(default)]
    pub method_code: Option<String>,
    #[serde(default)]
    pub primary_problem_code: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub age_years_at_start: Option<i64>,
}

/// Anamnesis save: COALESCE update of the case fields plus the complete
/// desired sets of previous therapies and medications.
#[derive(Debug, Clone, Deserialize)]
pub struct AnamnesisPayload {
    pub case_id: i64,
    #[serde(default)]
    pub method_code: Option<String>,
    #[serde(default)]
    pub primary_problem_code: Option<String>,
    #[serde(default)]
    pub target_description: Option<String>,
    #[serde(default)]
    pub sud_start: Option<f64>,
    #[serde(default)]
    pub problem_since_month: Option<String>,
    #[serde(default)]
    pub problem_duration_months: Option<i64>,
    #[serde(default)]
    pub age_years_at_start: Option<i64>,
    #[serde(default)]
    pub previous_therapies: Vec<PreviousTherapy>,
    #[serde(default)]
    pub medications: Vec<Medication>,
}
