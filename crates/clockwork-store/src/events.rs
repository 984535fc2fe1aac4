use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;

use clockwork_core::types::Event;
use clockwork_sandbox::context::EventSink;
use clockwork_sandbox::error::SandboxError;

use crate::error::Result;

/// Durable store for events emitted by production script runs.
pub struct SqliteEventStore {
    db: Mutex<Connection>,
}

impl SqliteEventStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    pub fn append(&self, project: &str, events: &[Event]) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare_cached(
            "INSERT INTO events (project, collection, properties, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for event in events {
            let properties = serde_json::to_string(&event.properties)?;
            stmt.execute(rusqlite::params![project, event.collection, properties, now])?;
        }
        Ok(())
    }

    /// All stored events for a project, oldest first.
    pub fn events(&self, project: &str) -> Result<Vec<Event>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT collection, properties FROM events WHERE project = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(rusqlite::params![project], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (collection, properties) = row?;
            out.push(Event {
                collection,
                properties: serde_json::from_str(&properties)?,
            });
        }
        Ok(out)
    }
}

/// [`EventSink`] view of the durable store, bound to one project — emitted
/// events carry no tenant of their own, the execution context does.
pub struct ProjectScopedSink {
    project: String,
    store: Arc<SqliteEventStore>,
}

impl ProjectScopedSink {
    pub fn new(project: impl Into<String>, store: Arc<SqliteEventStore>) -> Self {
        Self {
            project: project.into(),
            store,
        }
    }
}

impl EventSink for ProjectScopedSink {
    fn emit(&self, events: Vec<Event>) -> std::result::Result<(), SandboxError> {
        self.store
            .append(&self.project, &events)
            .map_err(SandboxError::persistence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use serde_json::json;

    fn store() -> Arc<SqliteEventStore> {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        Arc::new(SqliteEventStore::new(conn))
    }

    #[test]
    fn scoped_sink_writes_under_its_project() {
        let store = store();
        let sink = ProjectScopedSink::new("demo", store.clone());
        sink.emit(vec![Event {
            collection: "signup".into(),
            properties: json!({"plan": "free"}),
        }])
        .unwrap();

        let events = store.events("demo").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].collection, "signup");
        assert_eq!(events[0].properties["plan"], json!("free"));
        assert!(store.events("other").unwrap().is_empty());
    }
}
