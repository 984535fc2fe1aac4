use thiserror::Error;

/// Top-level error taxonomy for API-facing failures. Subsystem errors fold
/// into this at the gateway boundary, where `code()` feeds the error body.
#[derive(Debug, Error)]
pub enum ClockworkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Task not found: {id}")]
    TaskNotFound { id: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClockworkError {
    /// Short error code string sent to API clients in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ClockworkError::Config(_) => "CONFIG_ERROR",
            ClockworkError::Database(_) => "DATABASE_ERROR",
            ClockworkError::TaskNotFound { .. } => "TASK_NOT_FOUND",
            ClockworkError::Unauthorized(_) => "UNAUTHORIZED",
            ClockworkError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ClockworkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let not_found = ClockworkError::TaskNotFound { id: "t1".into() };
        assert_eq!(not_found.code(), "TASK_NOT_FOUND");
        assert_eq!(not_found.to_string(), "Task not found: t1");
        assert_eq!(ClockworkError::Config("x".into()).code(), "CONFIG_ERROR");
        assert_eq!(
            ClockworkError::Unauthorized("x".into()).code(),
            "UNAUTHORIZED"
        );
    }
}
