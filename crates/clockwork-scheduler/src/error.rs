use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
///
/// Lock contention never appears here: an unavailable lock is an expected
/// signal, reported as a skip or an "already running" outcome.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Repository / persistence failure.
    #[error(transparent)]
    Store(#[from] clockwork_store::error::StoreError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
