//! `clockwork-store` — SQLite persistence for the scheduled-task engine.
//!
//! Four stores share one schema (created idempotently by [`db::init_db`]):
//! the task repository, the per-project config key/value table, the
//! append-only per-task log streams, and the durable event store. Each store
//! wraps its own `Connection` in a `Mutex`, so subsystems never contend on a
//! shared handle.

pub mod configs;
pub mod db;
pub mod error;
pub mod events;
pub mod logs;
pub mod tasks;

pub use configs::SqliteConfigStore;
pub use error::{Result, StoreError};
pub use events::{ProjectScopedSink, SqliteEventStore};
pub use logs::{LogStore, PersistentLogger};
pub use tasks::TaskStore;
