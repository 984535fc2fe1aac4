use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::warn;

use clockwork_core::types::{LogEntry, LogLevel};
use clockwork_sandbox::context::ScriptLogger;

use crate::error::Result;

/// Append-only log streams, keyed by `(project, prefix)` where a task's
/// prefix is `scheduled-task.<id>`.
pub struct LogStore {
    db: Mutex<Connection>,
}

impl LogStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    pub fn append(&self, project: &str, prefix: &str, level: LogLevel, message: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO task_logs (project, prefix, level, message, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                project,
                prefix,
                level.to_string(),
                message,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Entries of one stream in append order, optionally bounded by time.
    pub fn entries(
        &self,
        project: &str,
        prefix: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<LogEntry>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare_cached(
            "SELECT level, message, timestamp FROM task_logs
             WHERE project = ?1 AND prefix = ?2
               AND (?3 IS NULL OR timestamp >= ?3)
               AND (?4 IS NULL OR timestamp <= ?4)
             ORDER BY timestamp, rowid",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![
                project,
                prefix,
                start.map(|t| t.to_rfc3339()),
                end.map(|t| t.to_rfc3339()),
            ],
            row_to_entry,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LogEntry> {
    let level: String = row.get(0)?;
    let timestamp: String = row.get(2)?;
    Ok(LogEntry {
        // Unknown level or timestamp text degrades instead of dropping the row.
        level: level.parse().unwrap_or(LogLevel::Info),
        message: row.get(1)?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

/// Durable [`ScriptLogger`] writing into a task's stream.
///
/// An append failure is reported on the engine's own diagnostics channel and
/// swallowed — a broken log store must not fail a running script.
pub struct PersistentLogger {
    store: Arc<LogStore>,
    project: String,
    prefix: String,
}

impl PersistentLogger {
    pub fn new(store: Arc<LogStore>, project: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            project: project.into(),
            prefix: prefix.into(),
        }
    }
}

impl ScriptLogger for PersistentLogger {
    fn log(&self, level: LogLevel, message: &str) {
        if let Err(e) = self.store.append(&self.project, &self.prefix, level, message) {
            warn!(project = %self.project, prefix = %self.prefix, "log append failed: {e}");
        }
    }
}
