use thiserror::Error;

/// Errors raised by the job store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No row with the given id exists.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// A script with the same unique name is already registered.
    #[error("Script name already in use: {0}")]
    DuplicateScriptName(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
