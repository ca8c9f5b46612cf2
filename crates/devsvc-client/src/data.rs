use async_trait::async_trait;
use devsvc_domain::{CookedEvent, EndpointConfig};
use tracing::debug;

use crate::error::ClientError;

/// Contract consumed by the core for the event ingestion REST API.
/// The client is responsible for marshalling and transport; the core
/// treats the cooked event as opaque and frees it after the call returns
/// (in Rust: the event is simply dropped at the end of the posting task).
#[async_trait]
pub trait DataClient: Send + Sync {
    async fn add_event(&self, endpoint: &EndpointConfig, event: &CookedEvent) -> Result<(), ClientError>;
}

pub struct HttpDataClient {
    client: reqwest::Client,
}

impl HttpDataClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataClient for HttpDataClient {
    async fn add_event(&self, endpoint: &EndpointConfig, event: &CookedEvent) -> Result<(), ClientError> {
        debug!(device = %event.device_name, resource = %event.resource_name, "data: add_event");
        let url = format!("{}/api/v1/event", endpoint.base_url());
        let resp = self
            .client
            .post(&url)
            .json(event)
            .send()
            .await
            .map_err(|e| ClientError::Transport { op: "add_event".into(), source: e })?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { op: "add_event".into(), status, body });
        }
        Ok(())
    }
}
