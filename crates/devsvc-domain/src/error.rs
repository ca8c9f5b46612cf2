use thiserror::Error;

/// Errors raised constructing or validating core domain entities.
///
/// These are the constructor-precondition failures from the error
/// taxonomy; everything else (bad config, remote-server-down, driver
/// rejection, metadata-op failures) is composed at the lifecycle layer
/// where the relevant context is available.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("no device implementation supplied")]
    NoDeviceImpl,

    #[error("no device service name supplied")]
    NoDeviceName,

    #[error("no device service version supplied")]
    NoDeviceVersion,

    #[error("invalid device id: {0}")]
    InvalidDeviceId(String),

    #[error("invalid profile id: {0}")]
    InvalidProfileId(String),

    #[error("invalid name/value pair: {0}")]
    InvalidPair(String),
}
