use async_trait::async_trait;
use devsvc_domain::EndpointConfig;
use serde::Serialize;

use crate::error::ClientError;

/// Contract consumed by the core for the optional remote logging REST
/// API, active only when `logging.use_remote` is set. Unlike
/// metadata/data, failures here are swallowed by callers — remote
/// logging is best-effort.
#[async_trait]
pub trait LoggingClient: Send + Sync {
    async fn log(&self, level: &str, message: &str) -> Result<(), ClientError>;
}

#[derive(Serialize)]
struct LogEntry<'a> {
    level: &'a str,
    message: &'a str,
}

pub struct HttpLoggingClient {
    client: reqwest::Client,
    endpoint: EndpointConfig,
}

impl HttpLoggingClient {
    pub fn new(client: reqwest::Client, endpoint: EndpointConfig) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl LoggingClient for HttpLoggingClient {
    async fn log(&self, level: &str, message: &str) -> Result<(), ClientError> {
        let url = format!("{}/api/v1/logs", self.endpoint.base_url());
        let resp = self
            .client
            .post(&url)
            .json(&LogEntry { level, message })
            .send()
            .await
            .map_err(|e| ClientError::Transport { op: "log".into(), source: e })?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { op: "log".into(), status, body });
        }
        Ok(())
    }
}
