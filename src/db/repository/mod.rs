//! Repository layer — entity-scoped database operations against the
//! personal store. Typed payloads are validated here, before any write;
//! multi-statement operations run inside a single transaction.

pub mod case;
pub mod catalog;
pub mod client;
pub mod session;

pub use case::*;
pub use catalog::*;
pub use client::*;
pub use session::*;

use super::DatabaseError;

/// SUD scores are a 0–10 self-report scale.
pub(crate) fn validate_sud(value: Option<f64>, field: &str) -> Result<(), DatabaseError> {
    if let Some(v) = value {
        if !(0.0..=10.0).contains(&v) {
            return Err(DatabaseError::Validation(format!(
                "{field} must be between 0 and 10, got {v}"
            )));
        }
    }
    Ok(())
}

/// Required text fields must carry non-whitespace content.
pub(crate) fn require_text(value: &str, field: &str) -> Result<String, DatabaseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DatabaseError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}
