use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::Gender;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub full_name: String,
    pub gender: Gender,
    pub dob: Option<NaiveDate>,
    pub contact: Option<String>,
}

/// Payload for `insert_client`. `full_name` and `gender` are required;
/// an optional intake block opens a first case in the same call.
#[derive(Debug, Clone, Deserialize)]
pub struct NewClient {
    pub full_name: String,
    pub gender: Gender,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub intake: Option<IntakeRequest>,
}

/// First-case shortcut submitted together with a new client.
#[derive(Debug, Clone, Deserialize)]
pub struct IntakeRequest {
    #[serde(default)]
    pub method_code: Option<String>,
    #[serde(default)]
    pub primary_problem_code: Option<String>,
    #[serde(default)]
    pub age_years_at_start: Option<i64>,
}

impl IntakeRequest {
    /// An all-empty intake block does not open a case.
    pub fn has_content(&self) -> bool {
        self.method_code.is_some()
            || self.primary_problem_code.is_some()
            || self.age_years_at_start.is_some()
    }
}

/// Partial update: absent fields keep their stored values.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientUpdate {
    pub id: i64,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub contact: Option<String>,
}
