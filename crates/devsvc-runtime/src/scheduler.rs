use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

type PeriodicTask = Box<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct Registered {
    interval: Duration,
    task: PeriodicTask,
}

/// Periodic-task runner used for autoevent-driven reads.
///
/// Task registration is performed by other components (autoevents); the
/// lifecycle engine only starts and stops the scheduler as a whole.
pub struct Scheduler {
    registered: Vec<Registered>,
    handles: Vec<JoinHandle<()>>,
    stop_flag: Arc<AtomicBool>,
    running: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self { registered: Vec::new(), handles: Vec::new(), stop_flag: Arc::new(AtomicBool::new(false)), running: false }
    }

    /// Register a task to run every `interval`. Must be called before [`start`](Self::start).
    pub fn register<F, Fut>(&mut self, interval: Duration, task: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.registered.push(Registered { interval, task: Box::new(move || Box::pin(task())) });
    }

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.stop_flag.store(false, Ordering::SeqCst);
        for reg in self.registered.drain(..) {
            let stop_flag = self.stop_flag.clone();
            let interval = reg.interval;
            let task = reg.task;
            self.handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await; // first tick fires immediately; skip it
                loop {
                    ticker.tick().await;
                    if stop_flag.load(Ordering::SeqCst) {
                        break;
                    }
                    task().await;
                }
            }));
        }
        self.running = true;
        info!(tasks = self.handles.len(), "scheduler started");
    }

    /// Signal all periodic tasks to stop and wait for them to exit.
    pub async fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.stop_flag.store(true, Ordering::SeqCst);
        for handle in self.handles.drain(..) {
            handle.abort();
            let _ = handle.await;
        }
        self.running = false;
        debug!("scheduler stopped");
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn registered_task_fires_periodically() {
        let mut sched = Scheduler::new();
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        sched.register(Duration::from_millis(10), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });
        sched.start();
        tokio::time::sleep(Duration::from_millis(55)).await;
        sched.stop().await;
        assert!(counter.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let mut sched = Scheduler::new();
        sched.stop().await;
    }
}
