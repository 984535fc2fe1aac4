//! `clockwork-core` — shared types, configuration and the top-level error
//! taxonomy for the Clockwork scheduled-task engine.
//!
//! Everything that more than one subsystem needs lives here: the durable
//! [`types::Task`] record, the per-task [`types::LogEntry`] stream shape,
//! emitted [`types::Event`]s, and the layered TOML + env configuration.

pub mod config;
pub mod error;
pub mod types;

pub use config::ClockworkConfig;
pub use error::{ClockworkError, Result};
pub use types::{Event, LogEntry, LogLevel, Parameter, Task, TaskId};
