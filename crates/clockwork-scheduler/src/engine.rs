//! The timer loop driving scheduled execution.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info};

use crate::service::TaskService;

/// Polls the repository every `tick` and dispatches whatever is due.
///
/// One instance runs for the process lifetime; executions it starts are
/// detached and settle on their own, so a slow script never stalls the loop.
pub struct SchedulerEngine {
    service: Arc<TaskService>,
    tick: Duration,
}

impl SchedulerEngine {
    pub fn new(service: Arc<TaskService>, tick: Duration) -> Self {
        Self { service, tick }
    }

    /// Run until `shutdown` flips to `true`. In-flight executions are left
    /// to settle; only the timer stops.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(tick_secs = self.tick.as_secs(), "scheduler started");
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.service.run_due(Utc::now()) {
                        // A failed sweep is retried on the next tick.
                        error!("scheduler sweep failed: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler stopping");
                        return;
                    }
                }
            }
        }
    }
}
