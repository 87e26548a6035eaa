use thiserror::Error;

/// Errors surfaced by the data layer.
///
/// `Validation`, `Forbidden` and `NotFound` carry user-facing messages.
/// `Sqlite` and `Poisoned` are store failures.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DbError>;
