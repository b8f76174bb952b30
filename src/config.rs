use std::path::{Path, PathBuf};

/// Application-level constants
pub const APP_NAME: &str = "Notizia";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn default_log_filter() -> &'static str {
    "notizia=info"
}

/// Get the application data directory
/// ~/Notizia/ on all platforms (user-visible by design)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join(APP_NAME)
}

/// Default path of the personal (identifiable) store.
pub fn personal_db_path() -> PathBuf {
    app_data_dir().join("personal.sqlite")
}

/// Default path of the study (anonymized aggregate) store.
pub fn study_db_path() -> PathBuf {
    app_data_dir().join("study.sqlite")
}

/// Migration scripts shipped with this crate, one directory per store.
/// Resolved against the crate source tree; packaged builds point a
/// [`StorageConfig`] at wherever the installer placed the scripts.
pub fn bundled_migrations_dir(store: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("resources")
        .join("migrations")
        .join(store)
}

/// Where export artifacts land: the user's documents directory,
/// falling back to home.
pub fn documents_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .expect("Cannot determine documents directory")
}

/// Filesystem layout for one pair of databases. The process entry point
/// builds this once and hands connections down from it — no global state.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub personal_db: PathBuf,
    pub study_db: PathBuf,
    pub personal_migrations: PathBuf,
    pub study_migrations: PathBuf,
    pub export_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            personal_db: personal_db_path(),
            study_db: study_db_path(),
            personal_migrations: bundled_migrations_dir("personal"),
            study_migrations: bundled_migrations_dir("study"),
            export_dir: documents_dir(),
        }
    }
}
