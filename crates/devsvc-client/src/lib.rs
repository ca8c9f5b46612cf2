pub mod data;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod ping;
pub mod registry;
pub mod registry_http;

pub use data::{DataClient, HttpDataClient};
pub use error::ClientError;
pub use logging::{HttpLoggingClient, LoggingClient};
pub use metadata::{HttpMetadataClient, MetadataClient};
pub use ping::ping_with_retry;
pub use registry::{apply_env_overrides, watch_config, RegistryClient};
pub use registry_http::HttpRegistryClient;
