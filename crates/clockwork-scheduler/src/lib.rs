//! `clockwork-scheduler` — the execution core of the engine.
//!
//! # Overview
//!
//! The [`engine::SchedulerEngine`] polls the task repository on a fixed
//! cadence and hands every due task to the [`dispatch::Dispatcher`], a
//! bounded worker pool running scripts off the timer thread. Per task id an
//! in-process [`locks::LockProvider`] guarantees at most one in-flight
//! execution across scheduled and manual triggers. The completion handler
//! finalises each run exactly once: success advances the schedule, failure
//! leaves it untouched so the task is simply retried next tick.
//!
//! Manual triggers ([`service::TaskService::trigger`]) and dry-runs
//! ([`service::TaskService::test`]) share the same dispatcher; dry-runs take
//! no lock, run against throwaway in-memory collaborators and are the only
//! executions with a deadline.

pub mod complete;
pub mod dispatch;
pub mod dryrun;
pub mod engine;
pub mod error;
pub mod locks;
pub mod service;

pub use dryrun::Environment;
pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
pub use locks::{InProcessLocks, LockGuard, LockProvider};
pub use service::{TaskService, TriggerOutcome};
