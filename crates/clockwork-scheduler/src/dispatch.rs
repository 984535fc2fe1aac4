//! Bounded worker pool running scripts off the scheduler's timer loop.
//!
//! Script execution is CPU-bound interpreter work, so each run goes through
//! `spawn_blocking`; a semaphore caps how many blocking workers the engine
//! may occupy at once. Dispatch itself never blocks the caller and returns a
//! handle the completion path awaits.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::trace;

use clockwork_sandbox::{param_bag, SandboxError, ScriptContext, ScriptEngine, ENTRY_POINT};
use clockwork_core::types::Task;

/// Handle to an in-flight execution.
pub type ExecutionHandle = JoinHandle<Result<(), SandboxError>>;

pub struct Dispatcher {
    engine: Arc<dyn ScriptEngine>,
    workers: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(engine: Arc<dyn ScriptEngine>, worker_count: usize) -> Self {
        Self {
            engine,
            workers: Arc::new(Semaphore::new(worker_count)),
        }
    }

    /// Queue one execution: compile the task's script and call its entry
    /// point with the declared parameters. Waits for a worker slot inside
    /// the spawned task, never in the caller.
    pub fn run(&self, task: &Task, ctx: ScriptContext) -> ExecutionHandle {
        let engine = Arc::clone(&self.engine);
        let workers = Arc::clone(&self.workers);
        let script = task.script.clone();
        let args = param_bag(&task.parameters);
        let id = task.id.clone();

        tokio::spawn(async move {
            // The semaphore is never closed, so acquisition cannot fail.
            let _permit = workers
                .acquire_owned()
                .await
                .map_err(|e| SandboxError::Unknown {
                    kind: "pool".to_string(),
                    message: e.to_string(),
                })?;
            trace!(id = %id, "worker slot acquired");

            let run = tokio::task::spawn_blocking(move || {
                engine.compile(&script)?.invoke(ENTRY_POINT, &args, &ctx)
            });
            join_result(run.await)
        })
    }
}

/// Flatten a blocking-task join: a panicked worker becomes a classified
/// execution failure instead of propagating the panic.
pub(crate) fn join_result(joined: Result<Result<(), SandboxError>, tokio::task::JoinError>) -> Result<(), SandboxError> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(SandboxError::Unknown {
            kind: "panic".to_string(),
            message: e.to_string(),
        }),
        Err(e) => Err(SandboxError::Unknown {
            kind: "join".to_string(),
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use clockwork_core::types::TaskId;
    use clockwork_sandbox::{
        Invocable, MemoryConfigStore, MemoryEventStore, ParamBag, ScopedConfig,
    };

    fn context() -> ScriptContext {
        ScriptContext {
            logger: Arc::new(clockwork_sandbox::BufferLogger::new()),
            configs: ScopedConfig::new(Arc::new(MemoryConfigStore::new()), "demo", None),
            events: Arc::new(MemoryEventStore::new()),
            deadline: None,
        }
    }

    fn task() -> Task {
        Task {
            id: TaskId::new(),
            project: "demo".to_string(),
            name: "t".to_string(),
            script: String::new(),
            parameters: HashMap::new(),
            image: None,
            interval_secs: 60,
            last_executed_at: None,
        }
    }

    /// Engine whose scripts sleep until told, counting concurrent runners.
    struct SlowEngine {
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    struct SlowScript {
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl ScriptEngine for SlowEngine {
        fn compile(&self, _source: &str) -> clockwork_sandbox::Result<Box<dyn Invocable>> {
            Ok(Box::new(SlowScript {
                running: Arc::clone(&self.running),
                peak: Arc::clone(&self.peak),
            }))
        }
    }

    impl Invocable for SlowScript {
        fn invoke(
            &self,
            _entry: &str,
            _args: &ParamBag,
            _ctx: &ScriptContext,
        ) -> clockwork_sandbox::Result<()> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn pool_caps_concurrent_executions() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(
            Arc::new(SlowEngine {
                running: Arc::clone(&running),
                peak: Arc::clone(&peak),
            }),
            2,
        );

        let handles: Vec<_> = (0..6).map(|_| dispatcher.run(&task(), context())).collect();
        for handle in handles {
            join_result(handle.await).unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }

    struct PanickyEngine;
    impl ScriptEngine for PanickyEngine {
        fn compile(&self, _source: &str) -> clockwork_sandbox::Result<Box<dyn Invocable>> {
            Ok(Box::new(PanickyScript))
        }
    }
    struct PanickyScript;
    impl Invocable for PanickyScript {
        fn invoke(
            &self,
            _entry: &str,
            _args: &ParamBag,
            _ctx: &ScriptContext,
        ) -> clockwork_sandbox::Result<()> {
            panic!("interpreter bug");
        }
    }

    #[tokio::test]
    async fn worker_panic_becomes_classified_failure() {
        let dispatcher = Dispatcher::new(Arc::new(PanickyEngine), 1);
        let result = join_result(dispatcher.run(&task(), context()).await);
        assert!(matches!(result, Err(SandboxError::Unknown { kind, .. }) if kind == "panic"));
    }
}
