// Storage error type shared by both backends

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Unique constraint violated (e.g. refresh token hash already stored)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Row absent, or filtered out by the lookup predicate
    #[error("not found")]
    NotFound,

    /// Database error
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(db_err.message().to_string())
            }
            _ => StoreError::Database(err.to_string()),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
