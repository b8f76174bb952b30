//! Notizia data layer: per-client therapy case records in a personal
//! SQLite store, plus an anonymized, aggregated study store rebuilt from
//! it on demand. The UI shell and process boundary live elsewhere; they
//! open the databases once at startup and call into the repository,
//! aggregation, and export functions with plain connections.

pub mod config;
pub mod db;
pub mod models;
pub mod study;

pub use db::DatabaseError;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the hosting process.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Notizia data layer v{}", config::APP_VERSION);
}
