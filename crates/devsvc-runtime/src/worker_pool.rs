use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::RuntimeError;

/// A unit of submitted work: an owned closure producing a future. The
/// (function, argument) pair of a callback-based queue collapses here
/// into a closure that simply captures its argument.
pub type Job = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + 'static>;

const DEFAULT_WORKER_COUNT: usize = 8;

/// Fixed-size set of workers consuming a submitted-work queue.
///
/// Used for asynchronous event posting and config-watch dispatch. No
/// ordering is guaranteed between submissions.
pub struct WorkerPool {
    sender: Option<mpsc::UnboundedSender<Job>>,
    workers: Vec<JoinHandle<()>>,
    queued: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Start `worker_count` workers (0 is coerced to the default of 8).
    pub fn start(worker_count: usize) -> Self {
        let worker_count = if worker_count == 0 { DEFAULT_WORKER_COUNT } else { worker_count };
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let queued = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let rx = rx.clone();
            let queued = queued.clone();
            let active = active.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let job = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    let Some(job) = job else {
                        debug!(worker = id, "worker pool channel closed, worker exiting");
                        break;
                    };
                    queued.fetch_sub(1, Ordering::SeqCst);
                    active.fetch_add(1, Ordering::SeqCst);
                    job().await;
                    active.fetch_sub(1, Ordering::SeqCst);
                }
            }));
        }

        Self { sender: Some(tx), workers, queued, active }
    }

    pub fn with_default_workers() -> Self {
        Self::start(DEFAULT_WORKER_COUNT)
    }

    /// Submit a job. Non-blocking: the call returns as soon as the job
    /// is enqueued, before any worker picks it up.
    pub fn submit(&self, job: Job) -> Result<(), RuntimeError> {
        match &self.sender {
            Some(tx) => {
                self.queued.fetch_add(1, Ordering::SeqCst);
                tx.send(job).map_err(|_| RuntimeError::ShutDown)?;
                Ok(())
            }
            None => Err(RuntimeError::ShutDown),
        }
    }

    /// Number of jobs submitted but not yet picked up by a worker.
    pub fn queued_count(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Number of jobs currently being executed.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Close the submission channel and wait for all in-flight and
    /// queued work to finish, then join every worker.
    pub async fn drain_and_stop(mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "worker task panicked during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn submitted_jobs_all_run() {
        let pool = WorkerPool::start(4);
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..20 {
            let counter = counter.clone();
            pool.submit(Box::new(move || {
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            }))
            .unwrap();
        }
        pool.drain_and_stop().await;
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn zero_worker_count_falls_back_to_default() {
        let pool = WorkerPool::start(0);
        assert_eq!(pool.workers.len(), DEFAULT_WORKER_COUNT);
        pool.drain_and_stop().await;
    }
}
