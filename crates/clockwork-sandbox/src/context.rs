//! Injected capabilities: what a running script can see of the outside world.
//!
//! Production wires these to SQLite-backed implementations (clockwork-store);
//! the dry-run path constructs the in-memory variants in this module so a
//! test execution can never touch durable state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use clockwork_core::types::{Event, LogEntry, LogLevel};
use serde_json::Value;

use crate::error::{Result, SandboxError};

/// Script-visible logger. Implementations append to a per-task log stream.
pub trait ScriptLogger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }
    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }
    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }
    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// Durable per-project key/value storage exposed to scripts.
pub trait ConfigStore: Send + Sync {
    fn get(&self, project: &str, key: &str) -> Result<Option<Value>>;
    fn set(&self, project: &str, key: &str, value: Value) -> Result<()>;
    /// All keys for a project — used to assemble a dry-run Environment.
    fn snapshot(&self, project: &str) -> Result<HashMap<String, Value>>;
}

/// Receives events emitted by scripts.
pub trait EventSink: Send + Sync {
    fn emit(&self, events: Vec<Event>) -> Result<()>;
}

/// Transforms events before they reach the sink (enrichment, normalisation).
pub trait EventMapper: Send + Sync {
    fn map(&self, event: &mut Event);
}

/// Everything an execution injects into the interpreter.
pub struct ScriptContext {
    pub logger: Arc<dyn ScriptLogger>,
    pub configs: ScopedConfig,
    pub events: Arc<dyn EventSink>,
    /// Hard wall-clock deadline; the interpreter interrupts past it.
    /// `None` for production runs, which are unbounded by design.
    pub deadline: Option<Instant>,
}

/// A project- and prefix-scoped view over a [`ConfigStore`].
///
/// Tasks get the prefix `scheduled-task.<id>` so two tasks in the same
/// project can never collide on a key; dry-runs use no prefix against their
/// throwaway store.
#[derive(Clone)]
pub struct ScopedConfig {
    store: Arc<dyn ConfigStore>,
    project: String,
    prefix: Option<String>,
}

impl ScopedConfig {
    pub fn new(store: Arc<dyn ConfigStore>, project: impl Into<String>, prefix: Option<String>) -> Self {
        Self {
            store,
            project: project.into(),
            prefix,
        }
    }

    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.to_string(),
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        self.store.get(&self.project, &self.full_key(key))
    }

    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        self.store.set(&self.project, &self.full_key(key), value)
    }
}

/// In-memory logger capturing entries for a dry-run Environment.
#[derive(Default)]
pub struct BufferLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl BufferLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl ScriptLogger for BufferLogger {
    fn log(&self, level: LogLevel, message: &str) {
        self.entries
            .lock()
            .unwrap()
            .push(LogEntry::now(level, message));
    }
}

/// In-memory [`ConfigStore`] — one instance per dry-run, never shared.
#[derive(Default)]
pub struct MemoryConfigStore {
    // project -> key -> value
    inner: Mutex<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, project: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .get(project)
            .and_then(|m| m.get(key).cloned()))
    }

    fn set(&self, project: &str, key: &str, value: Value) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .entry(project.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn snapshot(&self, project: &str) -> Result<HashMap<String, Value>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .get(project)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory [`EventSink`] capturing emitted events for a dry-run summary.
#[derive(Default)]
pub struct MemoryEventStore {
    events: Mutex<Vec<Event>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for MemoryEventStore {
    fn emit(&self, events: Vec<Event>) -> Result<()> {
        self.events.lock().unwrap().extend(events);
        Ok(())
    }
}

/// Forwards events through the declared mapper chain to a downstream sink.
///
/// The chain is shared (`Arc`) because a fresh sink is assembled for every
/// dispatch while the declared mappers live for the process lifetime.
pub struct MappedSink {
    mappers: Arc<Vec<Box<dyn EventMapper>>>,
    sink: Arc<dyn EventSink>,
}

impl MappedSink {
    pub fn new(mappers: Arc<Vec<Box<dyn EventMapper>>>, sink: Arc<dyn EventSink>) -> Self {
        Self { mappers, sink }
    }
}

impl EventSink for MappedSink {
    fn emit(&self, mut events: Vec<Event>) -> Result<()> {
        for event in events.iter_mut() {
            for mapper in self.mappers.iter() {
                mapper.map(event);
            }
        }
        self.sink.emit(events)
    }
}

impl SandboxError {
    /// Helper for capability backends wrapping their storage errors.
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        SandboxError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scoped_config_applies_task_prefix() {
        let store = Arc::new(MemoryConfigStore::new());
        let scoped = ScopedConfig::new(
            store.clone(),
            "demo",
            Some("scheduled-task.t1".to_string()),
        );
        scoped.set("cursor", json!(42)).unwrap();

        // Raw store sees the prefixed key; the scoped view sees the bare one.
        assert_eq!(
            store.get("demo", "scheduled-task.t1.cursor").unwrap(),
            Some(json!(42))
        );
        assert_eq!(scoped.get("cursor").unwrap(), Some(json!(42)));
        assert_eq!(store.get("demo", "cursor").unwrap(), None);
    }

    #[test]
    fn scoped_configs_of_two_tasks_never_collide() {
        let store = Arc::new(MemoryConfigStore::new());
        let a = ScopedConfig::new(store.clone(), "demo", Some("scheduled-task.a".into()));
        let b = ScopedConfig::new(store.clone(), "demo", Some("scheduled-task.b".into()));

        a.set("cursor", json!(1)).unwrap();
        b.set("cursor", json!(2)).unwrap();

        assert_eq!(a.get("cursor").unwrap(), Some(json!(1)));
        assert_eq!(b.get("cursor").unwrap(), Some(json!(2)));
    }

    #[test]
    fn unprefixed_scope_uses_bare_keys() {
        let store = Arc::new(MemoryConfigStore::new());
        let scoped = ScopedConfig::new(store.clone(), "demo", None);
        scoped.set("k", json!("v")).unwrap();
        assert_eq!(store.snapshot("demo").unwrap().get("k"), Some(&json!("v")));
    }

    #[test]
    fn mapped_sink_runs_mappers_in_order() {
        struct Tag(&'static str);
        impl EventMapper for Tag {
            fn map(&self, event: &mut Event) {
                event.collection.push_str(self.0);
            }
        }

        let store = Arc::new(MemoryEventStore::new());
        let mappers: Arc<Vec<Box<dyn EventMapper>>> =
            Arc::new(vec![Box::new(Tag("-a")), Box::new(Tag("-b"))]);
        let sink = MappedSink::new(mappers, store.clone());
        sink.emit(vec![Event {
            collection: "clicks".into(),
            properties: json!({}),
        }])
        .unwrap();

        assert_eq!(store.events()[0].collection, "clicks-a-b");
    }

    #[test]
    fn buffer_logger_preserves_order_and_level() {
        let logger = BufferLogger::new();
        logger.info("one");
        logger.error("two");

        let entries = logger.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[0].message, "one");
        assert_eq!(entries[1].level, LogLevel::Error);
    }
}
