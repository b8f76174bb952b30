use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub case_id: i64,
    pub date: NaiveDateTime,
    pub topic: Option<String>,
    pub sud_session: Option<f64>,
    pub duration_min: Option<i64>,
    /// Per-session override of the case's therapy method.
    pub method_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSession {
    pub case_id: i64,
    /// Defaults to now.
    #[serde(default)]
    pub date: Option<NaiveDateTime>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub sud_session: Option<f64>,
    #[serde(default)]
    pub duration_min: Option<i64>,
    #[serde(default)]
    pub method_code: Option<String>,
    /// Upserted into the 1:1 `session_notes` row.
    #[serde(default)]
    pub note: Option<String>,
}

/// Full overwrite of the editable session fields: an absent field
/// clears the stored value.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionUpdate {
    pub id: i64,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub sud_session: Option<f64>,
    #[serde(default)]
    pub duration_min: Option<i64>,
    #[serde(default)]
    pub method_code: Option<String>,
}
