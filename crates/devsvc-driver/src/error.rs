use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("driver init failed: {0}")]
    InitFailed(String),

    #[error("internal driver error: {0}")]
    Internal(String),
}
