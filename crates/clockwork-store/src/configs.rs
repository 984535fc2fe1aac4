use std::collections::HashMap;
use std::sync::Mutex;

use rusqlite::Connection;
use serde_json::Value;

use clockwork_sandbox::context::ConfigStore;
use clockwork_sandbox::error::SandboxError;

use crate::error::{Result, StoreError};

/// Durable per-project key/value store backing the `config_get`/`config_set`
/// script capability.
pub struct SqliteConfigStore {
    db: Mutex<Connection>,
}

impl SqliteConfigStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    fn get_inner(&self, project: &str, key: &str) -> Result<Option<Value>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT value FROM task_configs WHERE project = ?1 AND key = ?2",
            rusqlite::params![project, key],
            |row| row.get::<_, String>(0),
        ) {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    fn set_inner(&self, project: &str, key: &str, value: &Value) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO task_configs (project, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (project, key) DO UPDATE SET value = excluded.value",
            rusqlite::params![project, key, json],
        )?;
        Ok(())
    }

    fn snapshot_inner(&self, project: &str) -> Result<HashMap<String, Value>> {
        let db = self.db.lock().unwrap();
        let mut stmt =
            db.prepare("SELECT key, value FROM task_configs WHERE project = ?1 ORDER BY key")?;
        let rows = stmt.query_map(rusqlite::params![project], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut out = HashMap::new();
        for row in rows {
            let (key, json) = row?;
            out.insert(key, serde_json::from_str(&json)?);
        }
        Ok(out)
    }
}

impl ConfigStore for SqliteConfigStore {
    fn get(&self, project: &str, key: &str) -> std::result::Result<Option<Value>, SandboxError> {
        self.get_inner(project, key).map_err(SandboxError::persistence)
    }

    fn set(&self, project: &str, key: &str, value: Value) -> std::result::Result<(), SandboxError> {
        self.set_inner(project, key, &value)
            .map_err(SandboxError::persistence)
    }

    fn snapshot(
        &self,
        project: &str,
    ) -> std::result::Result<HashMap<String, Value>, SandboxError> {
        self.snapshot_inner(project).map_err(SandboxError::persistence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use serde_json::json;

    fn store() -> SqliteConfigStore {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        SqliteConfigStore::new(conn)
    }

    #[test]
    fn set_then_get_round_trips_json() {
        let store = store();
        store
            .set("demo", "scheduled-task.t1.cursor", json!({"page": 3}))
            .unwrap();
        assert_eq!(
            store.get("demo", "scheduled-task.t1.cursor").unwrap(),
            Some(json!({"page": 3}))
        );
    }

    #[test]
    fn set_overwrites_existing_value() {
        let store = store();
        store.set("demo", "k", json!(1)).unwrap();
        store.set("demo", "k", json!(2)).unwrap();
        assert_eq!(store.get("demo", "k").unwrap(), Some(json!(2)));
    }

    #[test]
    fn projects_are_isolated() {
        let store = store();
        store.set("a", "k", json!("va")).unwrap();
        store.set("b", "k", json!("vb")).unwrap();

        assert_eq!(store.get("a", "k").unwrap(), Some(json!("va")));
        assert_eq!(store.get("b", "k").unwrap(), Some(json!("vb")));
        assert_eq!(store.get("c", "k").unwrap(), None);

        let snap = store.snapshot("a").unwrap();
        assert_eq!(snap.len(), 1);
    }
}
