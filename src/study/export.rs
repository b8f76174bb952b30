//! CSV export of the study aggregates.
//!
//! Target is a spreadsheet tool configured for a semicolon-delimited,
//! comma-decimal locale: BOM prefix, CRLF line endings, a `sep=;` hint
//! line between two header rows (some tools ignore the hint and then
//! still see a header), decimal points rendered as commas, and empty
//! fields for missing values.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;

use super::aggregation::refresh_study_aggregates;
use super::reports::{method_problem_stats, StatRow};
use crate::db::DatabaseError;

const EXPORT_HEADER: [&str; 14] = [
    "Methode",
    "Problem",
    "Status",
    "Faelle",
    "Ø_Sitzungen",
    "Ø_SUD_Start",
    "Ø_SUD_Letz",
    "Ø_Δ_SUD",
    "%_mit_VorTherapie",
    "Ø_Dauer_VorTherapie_Mon",
    "%_m",
    "%_w",
    "%_d",
    "%_u",
];

/// Missing values become empty fields (not zero, not a placeholder);
/// present values swap the decimal point for a comma.
fn format_number(value: Option<f64>) -> String {
    match value {
        Some(v) if !v.is_nan() => v.to_string().replace('.', ","),
        _ => String::new(),
    }
}

fn format_row(row: &StatRow) -> String {
    [
        row.method_label.clone(),
        row.problem_label.clone(),
        row.status.as_str().to_string(),
        row.cases_n.to_string(),
        format_number(row.avg_sessions),
        format_number(row.avg_sud_start),
        format_number(row.avg_sud_last),
        format_number(row.avg_sud_delta),
        format_number(row.pct_prev_therapies),
        format_number(row.avg_prev_duration_mon),
        format_number(row.pct_m),
        format_number(row.pct_w),
        format_number(row.pct_d),
        format_number(row.pct_u),
    ]
    .join(";")
}

/// Render the full artifact body: BOM + CRLF-joined lines.
fn render_csv(rows: &[StatRow]) -> String {
    let header = EXPORT_HEADER.join(";");
    let mut lines = vec![header.clone(), "sep=;".to_string(), header];
    lines.extend(rows.iter().map(format_row));
    format!("\u{FEFF}{}", lines.join("\r\n"))
}

/// Refresh the study aggregates, then write them as a timestamped CSV
/// into `out_dir`. Returns the artifact path.
///
/// A write failure here does not undo the refresh — the study table
/// keeps the state the successful refresh produced.
pub fn export_study_csv(
    personal: &rusqlite::Connection,
    study: &rusqlite::Connection,
    out_dir: &Path,
) -> Result<PathBuf, DatabaseError> {
    refresh_study_aggregates(personal, study)?;
    let rows = method_problem_stats(study, None)?;
    let csv = render_csv(&rows);

    fs::create_dir_all(out_dir)?;
    let filename = format!(
        "notizia_study_export_{}.csv",
        Local::now().format("%Y%m%d_%H%M%S")
    );
    let path = out_dir.join(filename);
    fs::write(&path, csv)?;

    tracing::info!(path = %path.display(), rows = rows.len(), "wrote study export");
    Ok(path)
}
