//! Run finalisation: exactly one settlement per execution.
//!
//! The rules are small but load-bearing: a successful run advances
//! `last_executed_at`; a failed run leaves it untouched, so the task stays
//! due and retries on the next tick. Either way the outcome lands in the
//! task's own log stream and the per-task lock is returned.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error};

use clockwork_core::types::{LogLevel, Task};
use clockwork_sandbox::SandboxError;
use clockwork_store::{LogStore, TaskStore};

use crate::locks::LockGuard;

/// Render the outcome line appended to the task's log stream.
pub fn outcome_log_line(result: &Result<(), SandboxError>, elapsed_ms: u128) -> (LogLevel, String) {
    match result {
        Ok(()) => (
            LogLevel::Debug,
            format!("Successfully run in {elapsed_ms} ms"),
        ),
        Err(e) => (
            LogLevel::Error,
            format!("Failed to run the script in {elapsed_ms} ms : {e}"),
        ),
    }
}

/// Settle a finished run: persist the schedule advance on success, append
/// the outcome line, release the lock.
pub fn settle(
    tasks: &TaskStore,
    logs: &Arc<LogStore>,
    task: &Task,
    result: Result<(), SandboxError>,
    started: Instant,
    lock: LockGuard,
) {
    let elapsed_ms = started.elapsed().as_millis();

    if result.is_ok() {
        if let Err(e) = tasks.mark_executed(&task.project, &task.id, Utc::now()) {
            // The task may have been deleted mid-run; the next tick simply
            // won't see it anymore.
            error!(id = %task.id, "failed to advance schedule: {e}");
        }
    }
    drop(lock);

    let (level, line) = outcome_log_line(&result, elapsed_ms);
    match level {
        LogLevel::Error => error!(id = %task.id, project = %task.project, "{line}"),
        _ => debug!(id = %task.id, project = %task.project, "{line}"),
    }
    if let Err(e) = logs.append(&task.project, &task.id.prefix(), level, &line) {
        error!(id = %task.id, "failed to append outcome line: {e}");
    }
}
