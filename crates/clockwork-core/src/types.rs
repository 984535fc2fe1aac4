use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a task (UUIDv7 — time-sortable for easier log correlation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Config/log key prefix for this task. Derived from the id so two tasks
    /// in the same project can never collide on a config key.
    pub fn prefix(&self) -> String {
        format!("scheduled-task.{}", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A declared script parameter. A missing value is observed by the script
/// as an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(default)]
    pub value: Option<String>,
}

impl Parameter {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }
}

/// A persisted scheduled task: script text plus schedule metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Tenant identifier — every API operation is scoped to a project.
    pub project: String,
    /// Human-readable label.
    pub name: String,
    /// Script source text. Must define a `main` entry point.
    pub script: String,
    /// Declared parameters, passed to `main` as a name → value map.
    #[serde(default)]
    pub parameters: HashMap<String, Parameter>,
    /// Informational image tag shown in UIs — never executed.
    #[serde(default)]
    pub image: Option<String>,
    /// Re-run interval in seconds. Positive by caller contract; the engine
    /// does not clamp it.
    #[serde(rename = "interval")]
    pub interval_secs: u64,
    /// Set by the completion handler after the first successful run;
    /// `None` means the task has never completed and is always due.
    #[serde(default)]
    pub last_executed_at: Option<DateTime<Utc>>,
}

/// Severity of a script-visible log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// One line in a task's append-only log stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// An event emitted by a script, forwarded to the downstream event store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Target collection name.
    pub collection: String,
    /// Arbitrary JSON properties.
    pub properties: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_prefix_embeds_id() {
        let id = TaskId::from("abc");
        assert_eq!(id.prefix(), "scheduled-task.abc");
    }

    #[test]
    fn task_ids_are_unique_and_sortable() {
        let a = TaskId::new();
        let b = TaskId::new();
        assert_ne!(a, b);
        // UUIDv7 is time-ordered, so later ids sort after earlier ones.
        assert!(a.as_str() < b.as_str());
    }

    #[test]
    fn parameter_value_is_optional_in_json() {
        let p: Parameter = serde_json::from_str("{}").unwrap();
        assert_eq!(p.value, None);

        let p: Parameter = serde_json::from_str(r#"{"value":"x"}"#).unwrap();
        assert_eq!(p.value.as_deref(), Some("x"));
    }

    #[test]
    fn task_serializes_interval_field() {
        let task = Task {
            id: TaskId::from("t1"),
            project: "demo".into(),
            name: "nightly".into(),
            script: "fn main(params) {}".into(),
            parameters: HashMap::new(),
            image: None,
            interval_secs: 60,
            last_executed_at: None,
        };
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains(r#""interval":60"#));
        assert!(json.contains(r#""last_executed_at":null"#));
    }

    #[test]
    fn log_level_round_trip() {
        for level in ["debug", "info", "warn", "error"] {
            let parsed: LogLevel = level.parse().unwrap();
            assert_eq!(parsed.to_string(), level);
        }
        assert!("fatal".parse::<LogLevel>().is_err());
    }
}
