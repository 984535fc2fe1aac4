//! Dry-run execution: try a script out without touching durable state.
//!
//! A dry-run builds a throwaway world — buffered logs, an in-memory config
//! store, an in-memory event sink — and runs the script against it with a
//! hard deadline. Whatever happens, the caller gets back the [`Environment`]
//! the script produced, with failures folded into its log stream.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use clockwork_core::types::{Event, LogEntry, Parameter, Task, TaskId};
use clockwork_sandbox::{
    BufferLogger, ConfigStore, EventSink, MemoryConfigStore, MemoryEventStore, SandboxError,
    ScopedConfig, ScriptContext, ScriptLogger,
};

use crate::dispatch::join_result;
use crate::service::TaskService;

/// Everything a dry-run observed: the log stream the script produced and
/// the config keys it wrote.
#[derive(Debug, Serialize)]
pub struct Environment {
    pub logs: Vec<LogEntry>,
    pub configs: HashMap<String, Value>,
}

/// One-line summary of the events a dry-run emitted: the count plus the
/// first event's collection and properties.
pub fn event_summary(events: &[Event]) -> String {
    match events.first() {
        None => "No event is emitted".to_string(),
        Some(first) => format!(
            "Successfully got {} events: {}: {}",
            events.len(),
            first.collection,
            first.properties
        ),
    }
}

impl TaskService {
    /// Execute `script` once against in-memory collaborators. Takes no lock
    /// (a dry-run has no identity to contend on) and is the only execution
    /// path with a deadline.
    #[instrument(skip(self, script, parameters), fields(project = %project))]
    pub async fn test(
        &self,
        project: &str,
        script: &str,
        parameters: &HashMap<String, Parameter>,
    ) -> Environment {
        let logger = Arc::new(BufferLogger::new());
        let configs = Arc::new(MemoryConfigStore::new());
        let events = Arc::new(MemoryEventStore::new());

        let ctx = ScriptContext {
            logger: Arc::clone(&logger) as Arc<dyn ScriptLogger>,
            configs: ScopedConfig::new(Arc::clone(&configs) as Arc<dyn ConfigStore>, project, None),
            events: Arc::clone(&events) as Arc<dyn EventSink>,
            deadline: Some(Instant::now() + self.test_timeout),
        };

        let task = Task {
            id: TaskId::new(),
            project: project.to_string(),
            name: "dry-run".to_string(),
            script: script.to_string(),
            parameters: parameters.clone(),
            image: None,
            interval_secs: 0,
            last_executed_at: None,
        };

        let handle = self.dispatcher().run(&task, ctx);
        let abort = handle.abort_handle();

        // The interpreter interrupts itself at the deadline; the outer
        // timeout is the backstop for an engine stuck outside script code.
        let grace = self.test_timeout + Duration::from_secs(1);
        let result = match tokio::time::timeout(grace, handle).await {
            Ok(joined) => join_result(joined),
            Err(_) => {
                abort.abort();
                Err(SandboxError::Cancelled)
            }
        };

        match result {
            Ok(()) => {}
            Err(SandboxError::Cancelled) => {
                let secs = self.test_timeout.as_secs();
                logger.error(&format!(
                    "Timeout after {secs} seconds (the test execution is limited to {secs} seconds)"
                ));
            }
            Err(e) => logger.error(&e.to_string()),
        }
        // Every outcome gets the summary: events emitted before a failure or
        // the deadline still show up in the Environment.
        logger.info(&event_summary(&events.events()));

        Environment {
            logs: logger.entries(),
            configs: configs.snapshot(project).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn no_events_summarises_as_none_emitted() {
        assert_eq!(event_summary(&[]), "No event is emitted");
    }

    #[test]
    fn summary_counts_events_and_shows_the_first() {
        let events = vec![
            Event {
                collection: "pageview".to_string(),
                properties: json!({"path": "/"}),
            },
            Event {
                collection: "click".to_string(),
                properties: json!({"id": 3}),
            },
        ];
        assert_eq!(
            event_summary(&events),
            r#"Successfully got 2 events: pageview: {"path":"/"}"#
        );
    }
}
