use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("worker pool queue is full")]
    QueueFull,

    #[error("worker pool has already been shut down")]
    ShutDown,
}
