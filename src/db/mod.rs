pub mod drift;
pub mod migrations;
pub mod repository;
pub mod sqlite;

pub use sqlite::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: i64 },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Migration failed in {filename}: {reason}")]
    MigrationFailed { filename: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
