use serde::{Deserialize, Serialize};

/// Code → display label row of a reference catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub code: String,
    pub label: String,
}

/// The four read-only reference catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    TherapyMethods,
    ProblemCategories,
    PreviousTherapyTypes,
    MedicationCatalog,
}

impl CatalogKind {
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::TherapyMethods => "therapy_methods",
            Self::ProblemCategories => "problem_categories",
            Self::PreviousTherapyTypes => "previous_therapy_types",
            Self::MedicationCatalog => "medication_catalog",
        }
    }
}
