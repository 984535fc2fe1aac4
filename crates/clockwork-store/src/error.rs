use thiserror::Error;

/// Errors raised by the SQLite-backed stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A serialized column (parameter bag, config value) failed to encode.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No task with the given id exists in the project.
    #[error("task not found: {id}")]
    NotFound { id: String },
}

impl From<StoreError> for clockwork_core::error::ClockworkError {
    fn from(err: StoreError) -> Self {
        use clockwork_core::error::ClockworkError;
        match err {
            StoreError::Database(e) => ClockworkError::Database(e.to_string()),
            StoreError::Serialization(e) => ClockworkError::Serialization(e),
            StoreError::NotFound { id } => ClockworkError::TaskNotFound { id },
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
