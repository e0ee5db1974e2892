//! First-class scheduled tasks.
//!
//! Sweeps and counter resets are named, idempotent operations registered
//! with an explicit interval, not bare functions assumed to be wired up by
//! an external cron. The scheduler is constructed once at process start
//! and its handles are aborted on shutdown.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::Result;

type TaskFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
type TaskFn = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

struct ScheduledTask {
    name: &'static str,
    interval: Duration,
    op: TaskFn,
}

/// Registry of periodic tasks.
#[derive(Default)]
pub struct Scheduler {
    tasks: Vec<ScheduledTask>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named idempotent operation to run every `interval`.
    pub fn register<F, Fut>(&mut self, name: &'static str, interval: Duration, op: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.tasks.push(ScheduledTask {
            name,
            interval,
            op: Arc::new(move || Box::pin(op()) as TaskFuture),
        });
    }

    /// Spawn one loop per task. A failing run is logged and the loop
    /// continues; only abort stops it.
    #[must_use]
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        self.tasks
            .into_iter()
            .map(|task| {
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(task.interval);
                    // The first tick fires immediately; skip it so a fresh
                    // process does not sweep before serving.
                    ticker.tick().await;
                    loop {
                        ticker.tick().await;
                        debug!(task = task.name, "running scheduled task");
                        if let Err(e) = (task.op)().await {
                            error!(task = task.name, error = %e, "scheduled task failed");
                        }
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn registered_task_runs_on_interval() {
        let counter = Arc::new(AtomicU32::new(0));
        let seen = counter.clone();

        let mut scheduler = Scheduler::new();
        scheduler.register("test_tick", Duration::from_secs(60), move || {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let handles = scheduler.spawn();

        // Let the loop start its interval at t=0 before moving the clock,
        // otherwise the interval would only be created after the advance.
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;
        assert!(counter.load(Ordering::SeqCst) >= 1);

        for handle in handles {
            handle.abort();
        }
    }
}
