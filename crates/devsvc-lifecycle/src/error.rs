use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("no device implementation supplied")]
    NoDeviceImpl,

    #[error("no device service name supplied")]
    NoDeviceName,

    #[error("no device service version supplied")]
    NoDeviceVersion,

    #[error("required endpoint missing: {0}")]
    BadConfig(String),

    #[error("remote server down: {0}")]
    RemoteServerDown(String),

    #[error("driver init returned false")]
    DriverUnstart,

    #[error("configuration error: {0}")]
    Config(#[from] devsvc_config::ConfigError),

    #[error("client error: {0}")]
    Client(#[from] devsvc_client::ClientError),

    #[error("internal error: {0}")]
    Internal(String),
}
