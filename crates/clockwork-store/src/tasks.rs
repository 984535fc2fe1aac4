use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, instrument};

use clockwork_core::types::{Parameter, Task, TaskId};

use crate::error::{Result, StoreError};

const TASK_COLUMNS: &str =
    "id, project, name, code, parameters, image, schedule_interval, last_executed_at";

/// Thread-safe repository for persisted tasks.
///
/// Wraps a single SQLite connection in a `Mutex` — sufficient for the
/// single-node target; swap in a pool if contention ever shows up.
pub struct TaskStore {
    db: Mutex<Connection>,
}

impl TaskStore {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    /// Persist a new task. `last_executed_at` always starts NULL so the task
    /// is immediately due.
    #[instrument(skip(self, task), fields(id = %task.id, project = %task.project))]
    pub fn insert(&self, task: &Task) -> Result<()> {
        let parameters = serde_json::to_string(&task.parameters)?;
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO tasks (id, project, name, code, parameters, image, schedule_interval, last_executed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)",
            rusqlite::params![
                task.id.as_str(),
                task.project,
                task.name,
                task.script,
                parameters,
                task.image,
                task.interval_secs as i64,
            ],
        )?;
        debug!("task inserted");
        Ok(())
    }

    /// Fetch one task, scoped to its project.
    pub fn get(&self, project: &str, id: &TaskId) -> Result<Task> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE project = ?1 AND id = ?2"),
            rusqlite::params![project, id.as_str()],
            row_to_task,
        ) {
            Ok(task) => Ok(task),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::NotFound {
                id: id.to_string(),
            }),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    /// All tasks of a project, insertion order (UUIDv7 ids are time-sorted).
    pub fn list(&self, project: &str) -> Result<Vec<Task>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE project = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(rusqlite::params![project], row_to_task)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Tasks due at `now`: never executed, or last executed more than one
    /// interval ago. Selection order is unspecified by contract.
    pub fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare_cached(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE last_executed_at IS NULL
                OR (last_executed_at + schedule_interval) < ?1"
        ))?;
        let rows = stmt.query_map(rusqlite::params![now.timestamp()], row_to_task)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Update script, parameters and interval. Zero rows affected means the
    /// id does not exist in this project.
    #[instrument(skip(self, task), fields(id = %task.id, project = %project))]
    pub fn update(&self, project: &str, task: &Task) -> Result<()> {
        let parameters = serde_json::to_string(&task.parameters)?;
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "UPDATE tasks
             SET name = ?1, code = ?2, parameters = ?3, image = ?4, schedule_interval = ?5
             WHERE project = ?6 AND id = ?7",
            rusqlite::params![
                task.name,
                task.script,
                parameters,
                task.image,
                task.interval_secs as i64,
                project,
                task.id.as_str(),
            ],
        )?;
        if rows_changed == 0 {
            return Err(StoreError::NotFound {
                id: task.id.to_string(),
            });
        }
        Ok(())
    }

    /// Permanently delete a task.
    #[instrument(skip(self), fields(id = %id, project = %project))]
    pub fn delete(&self, project: &str, id: &TaskId) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "DELETE FROM tasks WHERE project = ?1 AND id = ?2",
            rusqlite::params![project, id.as_str()],
        )?;
        if rows_changed == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Advance the schedule after a successful run. Only the completion
    /// handler calls this — failed runs leave the column untouched so the
    /// task stays due.
    #[instrument(skip(self), fields(id = %id, project = %project))]
    pub fn mark_executed(&self, project: &str, id: &TaskId, at: DateTime<Utc>) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "UPDATE tasks SET last_executed_at = ?1 WHERE project = ?2 AND id = ?3",
            rusqlite::params![at.timestamp(), project, id.as_str()],
        )?;
        if rows_changed == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        Ok(())
    }
}

/// Map a SQLite row to a `Task`.
///
/// A malformed parameters column degrades to an empty map rather than
/// poisoning whole-list queries.
fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let parameters: HashMap<String, Parameter> = row
        .get::<_, Option<String>>(4)?
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default();

    let last_executed_at = row
        .get::<_, Option<i64>>(7)?
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    Ok(Task {
        id: TaskId::from(row.get::<_, String>(0)?),
        project: row.get(1)?,
        name: row.get(2)?,
        script: row.get(3)?,
        parameters,
        image: row.get(5)?,
        interval_secs: row.get::<_, i64>(6)? as u64,
        last_executed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use chrono::Duration;

    fn store() -> TaskStore {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        TaskStore::new(conn)
    }

    fn sample(project: &str, interval_secs: u64) -> Task {
        let mut parameters = HashMap::new();
        parameters.insert("url".to_string(), Parameter::with_value("https://x"));
        Task {
            id: TaskId::new(),
            project: project.to_string(),
            name: "poll".to_string(),
            script: "fn main(params) {}".to_string(),
            parameters,
            image: Some("globe".to_string()),
            interval_secs,
            last_executed_at: None,
        }
    }

    #[test]
    fn insert_then_get_round_trips() {
        let store = store();
        let task = sample("demo", 60);
        store.insert(&task).unwrap();

        let loaded = store.get("demo", &task.id).unwrap();
        assert_eq!(loaded.name, "poll");
        assert_eq!(loaded.script, task.script);
        assert_eq!(loaded.parameters, task.parameters);
        assert_eq!(loaded.image.as_deref(), Some("globe"));
        assert_eq!(loaded.interval_secs, 60);
        assert!(loaded.last_executed_at.is_none());
    }

    #[test]
    fn get_is_project_scoped() {
        let store = store();
        let task = sample("demo", 60);
        store.insert(&task).unwrap();

        assert!(matches!(
            store.get("other", &task.id),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn never_executed_task_is_due() {
        let store = store();
        let task = sample("demo", 60);
        store.insert(&task).unwrap();

        let due = store.list_due(Utc::now()).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, task.id);
    }

    #[test]
    fn success_advances_schedule_until_interval_elapses() {
        let store = store();
        let task = sample("demo", 60);
        store.insert(&task).unwrap();

        let ran_at = Utc::now();
        store.mark_executed("demo", &task.id, ran_at).unwrap();

        // Within the interval: not due.
        assert!(store
            .list_due(ran_at + Duration::seconds(30))
            .unwrap()
            .is_empty());
        // Past it: due again.
        let due = store.list_due(ran_at + Duration::seconds(61)).unwrap();
        assert_eq!(due.len(), 1);
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let store = store();
        let task = sample("demo", 60);
        // Never inserted.
        assert!(matches!(
            store.update("demo", &task),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn update_rewrites_script_and_interval() {
        let store = store();
        let mut task = sample("demo", 60);
        store.insert(&task).unwrap();

        task.script = "fn main(params) { log_info(\"v2\"); }".to_string();
        task.interval_secs = 300;
        store.update("demo", &task).unwrap();

        let loaded = store.get("demo", &task.id).unwrap();
        assert!(loaded.script.contains("v2"));
        assert_eq!(loaded.interval_secs, 300);
    }

    #[test]
    fn delete_unknown_id_is_not_found() {
        let store = store();
        assert!(matches!(
            store.delete("demo", &TaskId::new()),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn list_surfaces_row_mapping_failures() {
        // A schema-drifted table whose interval column holds text: mapping
        // the row must fail the whole query, not silently shrink the list.
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE tasks (
                id TEXT, project TEXT, name TEXT, code TEXT, parameters TEXT,
                image TEXT, last_executed_at TEXT, schedule_interval TEXT
            );
            INSERT INTO tasks VALUES ('t1', 'demo', 'n', 'c', NULL, NULL, NULL, 'sixty');",
        )
        .unwrap();
        let store = TaskStore::new(conn);

        assert!(matches!(
            store.list("demo"),
            Err(StoreError::Database(_))
        ));
    }

    #[test]
    fn list_is_project_scoped() {
        let store = store();
        store.insert(&sample("a", 60)).unwrap();
        store.insert(&sample("a", 60)).unwrap();
        store.insert(&sample("b", 60)).unwrap();

        assert_eq!(store.list("a").unwrap().len(), 2);
        assert_eq!(store.list("b").unwrap().len(), 1);
        assert!(store.list("c").unwrap().is_empty());
    }
}
