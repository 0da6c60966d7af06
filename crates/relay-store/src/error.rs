use thiserror::Error;

/// Errors that can occur within the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying Postgres / sqlx error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The optimistic claim found the job no longer PENDING. Expected under
    /// contention; callers skip the job for the current tick.
    #[error("Claim lost for job {id}: status is no longer PENDING")]
    StatusConflict { id: i64 },

    /// No job with the given ID exists in the store.
    #[error("Job not found: {id}")]
    NotFound { id: i64 },

    /// A stored row carries a status or message type outside the closed enum.
    #[error("Invalid row data: {0}")]
    InvalidRow(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
