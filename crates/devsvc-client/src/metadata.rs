use async_trait::async_trait;
use devsvc_domain::{Addressable, Device, DeviceServiceRecord, ProvisionWatcher};
use tracing::debug;

use crate::error::ClientError;

/// Contract consumed by the core for the metadata REST API. Every
/// operation may fail; failures are always reported as
/// `ClientError::Api`/`ClientError::Transport`, prefixed with the failing
/// operation by the caller when surfaced.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    async fn get_deviceservice(&self, name: &str) -> Result<Option<DeviceServiceRecord>, ClientError>;
    async fn get_addressable(&self, name: &str) -> Result<Option<Addressable>, ClientError>;
    async fn create_addressable(&self, addr: &Addressable) -> Result<String, ClientError>;
    async fn update_addressable(&self, addr: &Addressable) -> Result<(), ClientError>;
    async fn create_deviceservice(&self, ds: &DeviceServiceRecord) -> Result<String, ClientError>;
    async fn get_devices(&self, service_name: &str) -> Result<Vec<Device>, ClientError>;
    async fn get_watchers(&self, service_name: &str) -> Result<Vec<ProvisionWatcher>, ClientError>;
}

/// Production metadata client backed by `reqwest`.
pub struct HttpMetadataClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMetadataClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_json(&self, op: &str, path: &str) -> Result<Option<serde_json::Value>, ClientError> {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| ClientError::Transport { op: op.to_string(), source: e })?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { op: op.to_string(), status, body });
        }
        let value = resp
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ClientError::Decode { op: op.to_string(), source: e })?;
        Ok(Some(value))
    }

    fn decode<T: serde::de::DeserializeOwned>(op: &str, v: serde_json::Value) -> Result<T, ClientError> {
        serde_json::from_value(v)
            .map_err(|e| ClientError::Api { op: op.to_string(), status: 0, body: format!("decode failure: {e}") })
    }

    async fn post_json<B: serde::Serialize>(&self, op: &str, path: &str, body: &B) -> Result<String, ClientError> {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Transport { op: op.to_string(), source: e })?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { op: op.to_string(), status, body });
        }
        resp.text().await.map_err(|e| ClientError::Decode { op: op.to_string(), source: e })
    }
}

#[async_trait]
impl MetadataClient for HttpMetadataClient {
    async fn get_deviceservice(&self, name: &str) -> Result<Option<DeviceServiceRecord>, ClientError> {
        debug!(name, "metadata: get_deviceservice");
        let path = format!("/api/v1/deviceservice/name/{}", name);
        match self.get_json("get_deviceservice", &path).await? {
            None => Ok(None),
            Some(v) => Self::decode("get_deviceservice", v).map(Some),
        }
    }

    async fn get_addressable(&self, name: &str) -> Result<Option<Addressable>, ClientError> {
        debug!(name, "metadata: get_addressable");
        let path = format!("/api/v1/addressable/name/{}", name);
        match self.get_json("get_addressable", &path).await? {
            None => Ok(None),
            Some(v) => Self::decode("get_addressable", v).map(Some),
        }
    }

    async fn create_addressable(&self, addr: &Addressable) -> Result<String, ClientError> {
        debug!(name = %addr.name, "metadata: create_addressable");
        self.post_json("create_addressable", "/api/v1/addressable", addr).await
    }

    async fn update_addressable(&self, addr: &Addressable) -> Result<(), ClientError> {
        debug!(name = %addr.name, "metadata: update_addressable");
        let resp = self
            .client
            .put(self.url("/api/v1/addressable"))
            .json(addr)
            .send()
            .await
            .map_err(|e| ClientError::Transport { op: "update_addressable".into(), source: e })?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { op: "update_addressable".into(), status, body });
        }
        Ok(())
    }

    async fn create_deviceservice(&self, ds: &DeviceServiceRecord) -> Result<String, ClientError> {
        debug!(name = %ds.name, "metadata: create_deviceservice");
        self.post_json("create_deviceservice", "/api/v1/deviceservice", ds).await
    }

    async fn get_devices(&self, service_name: &str) -> Result<Vec<Device>, ClientError> {
        debug!(service_name, "metadata: get_devices");
        let path = format!("/api/v1/device/servicename/{}", service_name);
        match self.get_json("get_devices", &path).await? {
            None => Ok(Vec::new()),
            Some(v) => Self::decode("get_devices", v),
        }
    }

    async fn get_watchers(&self, service_name: &str) -> Result<Vec<ProvisionWatcher>, ClientError> {
        debug!(service_name, "metadata: get_watchers");
        let path = format!("/api/v1/provisionwatcher/servicename/{}", service_name);
        match self.get_json("get_watchers", &path).await? {
            None => Ok(Vec::new()),
            Some(v) => Self::decode("get_watchers", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn get_deviceservice_missing_returns_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/deviceservice/name/svc-a"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpMetadataClient::new(reqwest::Client::new(), server.uri());
        let result = client.get_deviceservice("svc-a").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn get_devices_decodes_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/device/servicename/svc-a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = HttpMetadataClient::new(reqwest::Client::new(), server.uri());
        let devices = client.get_devices("svc-a").await.unwrap();
        assert!(devices.is_empty());
    }

    #[tokio::test]
    async fn server_error_is_surfaced_with_op_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/device/servicename/svc-a"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = HttpMetadataClient::new(reqwest::Client::new(), server.uri());
        let err = client.get_devices("svc-a").await.unwrap_err();
        assert!(err.to_string().contains("get_devices"));
    }
}
