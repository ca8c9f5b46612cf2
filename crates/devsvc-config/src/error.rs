use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("toml parse error in {path}: {source}")]
    TomlParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid argument: {0}")]
    InvalidArg(String),

    #[error("required endpoint missing: {0}")]
    BadConfig(String),

    #[error("registry unreachable after retries: {0}")]
    RemoteServerDown(String),

    #[error("client error: {0}")]
    Client(#[from] devsvc_client::ClientError),
}
