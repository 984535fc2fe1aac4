//! The task service: every operation the gateway exposes goes through here.
//!
//! CRUD delegates to the repository; `run_due` and `trigger` are the two
//! entry points into execution and both funnel through the same
//! lock-dispatch-settle pipeline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, trace};

use clockwork_core::types::{LogEntry, Task, TaskId};
use clockwork_sandbox::{
    ConfigStore, EventMapper, MappedSink, ScopedConfig, ScriptContext,
};
use clockwork_store::{
    LogStore, PersistentLogger, ProjectScopedSink, SqliteEventStore, TaskStore,
};

use crate::complete::settle;
use crate::dispatch::{join_result, Dispatcher};
use crate::error::Result;
use crate::locks::{LockGuard, LockProvider};

/// Result of a manual trigger request.
pub enum TriggerOutcome {
    /// An execution was started; the handle resolves once the run settled.
    Started(JoinHandle<()>),
    /// Another execution of the same task already holds the lock.
    AlreadyRunning,
}

impl TriggerOutcome {
    /// Human-readable status returned to the caller.
    pub fn message(&self) -> &'static str {
        match self {
            TriggerOutcome::Started(_) => "The task is running",
            TriggerOutcome::AlreadyRunning => "The task is already running",
        }
    }
}

pub struct TaskService {
    tasks: Arc<TaskStore>,
    logs: Arc<LogStore>,
    configs: Arc<dyn ConfigStore>,
    events: Arc<SqliteEventStore>,
    locks: Arc<dyn LockProvider>,
    dispatcher: Dispatcher,
    mappers: Arc<Vec<Box<dyn EventMapper>>>,
    pub(crate) test_timeout: Duration,
}

impl TaskService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: Arc<TaskStore>,
        logs: Arc<LogStore>,
        configs: Arc<dyn ConfigStore>,
        events: Arc<SqliteEventStore>,
        locks: Arc<dyn LockProvider>,
        dispatcher: Dispatcher,
        mappers: Vec<Box<dyn EventMapper>>,
        test_timeout: Duration,
    ) -> Self {
        Self {
            tasks,
            logs,
            configs,
            events,
            locks,
            dispatcher,
            mappers: Arc::new(mappers),
            test_timeout,
        }
    }

    // ---- CRUD -----------------------------------------------------------

    #[instrument(skip(self, task), fields(id = %task.id, project = %task.project))]
    pub fn create(&self, task: &Task) -> Result<()> {
        self.tasks.insert(task)?;
        Ok(())
    }

    pub fn get(&self, project: &str, id: &TaskId) -> Result<Task> {
        Ok(self.tasks.get(project, id)?)
    }

    pub fn list(&self, project: &str) -> Result<Vec<Task>> {
        Ok(self.tasks.list(project)?)
    }

    #[instrument(skip(self, task), fields(id = %task.id, project = %project))]
    pub fn update(&self, project: &str, task: &Task) -> Result<()> {
        self.tasks.update(project, task)?;
        Ok(())
    }

    #[instrument(skip(self), fields(id = %id, project = %project))]
    pub fn delete(&self, project: &str, id: &TaskId) -> Result<()> {
        self.tasks.delete(project, id)?;
        Ok(())
    }

    /// The task's log stream, newest-last, optionally bounded by time.
    pub fn log_entries(
        &self,
        project: &str,
        id: &TaskId,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<LogEntry>> {
        Ok(self.logs.entries(project, &id.prefix(), start, end)?)
    }

    // ---- Execution ------------------------------------------------------

    /// Run every task due at `now`. Tasks whose lock is held are skipped
    /// (they are already running) and will be reconsidered next tick.
    /// Returns the settlement handles of the runs that started.
    #[instrument(skip(self))]
    pub fn run_due(&self, now: DateTime<Utc>) -> Result<Vec<JoinHandle<()>>> {
        let due = self.tasks.list_due(now)?;
        debug!(count = due.len(), "due tasks collected");

        let mut started = Vec::new();
        for task in due {
            match self.locks.try_acquire(task.id.as_str()) {
                Some(lock) => started.push(self.spawn_execution(task, lock)),
                None => trace!(id = %task.id, "already running, skipped"),
            }
        }
        Ok(started)
    }

    /// Run one task immediately, outside its schedule. A trigger competes
    /// for the same lock as scheduled runs, so a task can never run twice
    /// concurrently no matter how it was started.
    #[instrument(skip(self), fields(id = %id, project = %project))]
    pub fn trigger(&self, project: &str, id: &TaskId) -> Result<TriggerOutcome> {
        let Some(lock) = self.locks.try_acquire(id.as_str()) else {
            return Ok(TriggerOutcome::AlreadyRunning);
        };
        // An unknown id drops the guard here, so the lock is not leaked.
        let task = self.tasks.get(project, id)?;
        Ok(TriggerOutcome::Started(self.spawn_execution(task, lock)))
    }

    /// Production execution context: durable logger, task-prefixed configs,
    /// mapped events flowing into the event store. No deadline.
    fn context_for(&self, task: &Task) -> ScriptContext {
        ScriptContext {
            logger: Arc::new(PersistentLogger::new(
                Arc::clone(&self.logs),
                task.project.clone(),
                task.id.prefix(),
            )),
            configs: ScopedConfig::new(
                Arc::clone(&self.configs),
                task.project.clone(),
                Some(task.id.prefix()),
            ),
            events: Arc::new(MappedSink::new(
                Arc::clone(&self.mappers),
                Arc::new(ProjectScopedSink::new(
                    task.project.clone(),
                    Arc::clone(&self.events),
                )),
            )),
            deadline: None,
        }
    }

    fn spawn_execution(&self, task: Task, lock: LockGuard) -> JoinHandle<()> {
        let ctx = self.context_for(&task);
        let handle = self.dispatcher.run(&task, ctx);
        let tasks = Arc::clone(&self.tasks);
        let logs = Arc::clone(&self.logs);
        let started = Instant::now();

        tokio::spawn(async move {
            let result = join_result(handle.await);
            settle(&tasks, &logs, &task, result, started, lock);
        })
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
