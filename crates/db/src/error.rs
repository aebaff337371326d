//! Typed error type for the db crate.

use thiserror::Error;

use effects::EffectError;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("row not found")]
    NotFound,

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<DbError> for EffectError {
    /// Connection and I/O trouble is worth retrying; anything about the data
    /// itself is not.
    fn from(err: DbError) -> Self {
        match &err {
            DbError::Sqlx(
                sqlx::Error::Io(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed,
            ) => EffectError::Retryable(err.to_string()),
            _ => EffectError::Fatal(err.to_string()),
        }
    }
}
