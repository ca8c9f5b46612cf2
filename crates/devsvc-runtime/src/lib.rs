pub mod error;
pub mod scheduler;
pub mod worker_pool;

pub use error::RuntimeError;
pub use scheduler::Scheduler;
pub use worker_pool::{Job, WorkerPool};
