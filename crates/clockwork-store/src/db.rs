use rusqlite::Connection;

use crate::error::Result;

/// Initialise the full schema in `conn`.
///
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout. The due
/// predicate does its arithmetic in SQL, so `last_executed_at` is stored as
/// epoch seconds rather than text.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tasks (
            id                TEXT    NOT NULL PRIMARY KEY,
            project           TEXT    NOT NULL,
            name              TEXT    NOT NULL,
            image             TEXT,
            code              TEXT    NOT NULL,
            parameters        TEXT,               -- JSON name -> Parameter
            last_executed_at  INTEGER,            -- epoch seconds, NULL until first success
            schedule_interval INTEGER NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks (project);
        -- Efficient polling: WHERE last_executed_at IS NULL OR … < now
        CREATE INDEX IF NOT EXISTS idx_tasks_due ON tasks (last_executed_at);

        CREATE TABLE IF NOT EXISTS task_configs (
            project TEXT NOT NULL,
            key     TEXT NOT NULL,
            value   TEXT NOT NULL,                -- JSON
            PRIMARY KEY (project, key)
        ) STRICT;

        CREATE TABLE IF NOT EXISTS task_logs (
            project   TEXT NOT NULL,
            prefix    TEXT NOT NULL,              -- scheduled-task.<id>
            level     TEXT NOT NULL,
            message   TEXT NOT NULL,
            timestamp TEXT NOT NULL               -- ISO-8601
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_task_logs_stream
            ON task_logs (project, prefix, timestamp);

        CREATE TABLE IF NOT EXISTS events (
            project    TEXT NOT NULL,
            collection TEXT NOT NULL,
            properties TEXT NOT NULL,             -- JSON
            created_at TEXT NOT NULL
        ) STRICT;
        ",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_db_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
    }
}
