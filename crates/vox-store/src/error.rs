//! Store error types.

/// Errors surfaced by a [`PresenceStore`](crate::PresenceStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database rejected a statement.
    #[error("database error: {0}")]
    Database(String),

    /// Filesystem failure while opening the database.
    #[error("IO error: {0}")]
    Io(String),

    /// The store was used after [`disconnect`](crate::PresenceStore::disconnect).
    #[error("store is closed")]
    Closed,

    /// A blocking worker panicked or was cancelled.
    #[error("store task failed: {0}")]
    Task(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Task(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
