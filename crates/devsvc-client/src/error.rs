use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {op} failed: {source}")]
    Transport {
        op: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{op}: server returned {status}: {body}")]
    Api { op: String, status: u16, body: String },

    #[error("{op}: failed to decode response: {source}")]
    Decode {
        op: String,
        #[source]
        source: reqwest::Error,
    },

    /// A required remote service failed all ping retries.
    #[error("remote server down: {0}")]
    RemoteServerDown(String),
}

impl ClientError {
    /// The failing operation, prefixed onto the reason string surfaced to
    /// callers.
    pub fn prefixed_reason(&self) -> String {
        self.to_string()
    }
}
