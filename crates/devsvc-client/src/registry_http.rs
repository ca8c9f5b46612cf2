use async_trait::async_trait;
use devsvc_domain::NvList;
use tracing::debug;

use crate::error::ClientError;
use crate::registry::RegistryClient;

/// REST-backed registry client. Assumes a registry exposing:
/// - `GET  /api/v1/ping`
/// - `GET  /api/v1/config/{name}/{profile}`            -> flat key/value list or 404
/// - `PUT  /api/v1/config/{name}/{profile}`             <- flat key/value list
/// - `PUT  /api/v1/registration/{name}`                 <- {host, port, health_interval_secs}
/// - `DELETE /api/v1/registration/{name}`
/// - `GET  /api/v1/registration/{name}`                 -> {host, port}
pub struct HttpRegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRegistryClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(serde::Serialize)]
struct RegistrationBody {
    host: String,
    port: u16,
    health_interval_secs: u64,
}

#[derive(serde::Deserialize)]
struct RegistrationInfo {
    host: String,
    port: u16,
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn ping(&self) -> bool {
        self.client
            .get(self.url("/api/v1/ping"))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn get_config(&self, name: &str, profile: &str) -> Result<Option<NvList>, ClientError> {
        debug!(name, profile, "registry: get_config");
        let path = format!("/api/v1/config/{}/{}", name, profile);
        let resp = self
            .client
            .get(self.url(&path))
            .send()
            .await
            .map_err(|e| ClientError::Transport { op: "get_config".into(), source: e })?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { op: "get_config".into(), status, body });
        }
        let pairs: Vec<(String, String)> = resp
            .json()
            .await
            .map_err(|e| ClientError::Decode { op: "get_config".into(), source: e })?;
        Ok(Some(NvList::from_pairs(pairs)))
    }

    async fn put_config(&self, name: &str, profile: &str, config: &NvList) -> Result<(), ClientError> {
        debug!(name, profile, "registry: put_config");
        let path = format!("/api/v1/config/{}/{}", name, profile);
        let pairs: Vec<(&str, &str)> = config.iter().collect();
        let resp = self
            .client
            .put(self.url(&path))
            .json(&pairs)
            .send()
            .await
            .map_err(|e| ClientError::Transport { op: "put_config".into(), source: e })?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { op: "put_config".into(), status, body });
        }
        Ok(())
    }

    async fn register_service(
        &self,
        name: &str,
        host: &str,
        port: u16,
        health_interval_secs: u64,
    ) -> Result<(), ClientError> {
        debug!(name, host, port, "registry: register_service");
        let path = format!("/api/v1/registration/{}", name);
        let body = RegistrationBody { host: host.to_string(), port, health_interval_secs };
        let resp = self
            .client
            .put(self.url(&path))
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Transport { op: "register_service".into(), source: e })?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { op: "register_service".into(), status, body });
        }
        Ok(())
    }

    async fn deregister_service(&self, name: &str) -> Result<(), ClientError> {
        debug!(name, "registry: deregister_service");
        let path = format!("/api/v1/registration/{}", name);
        let resp = self
            .client
            .delete(self.url(&path))
            .send()
            .await
            .map_err(|e| ClientError::Transport { op: "deregister_service".into(), source: e })?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { op: "deregister_service".into(), status, body });
        }
        Ok(())
    }

    async fn query_service(&self, name: &str) -> Result<(String, u16), ClientError> {
        debug!(name, "registry: query_service");
        let path = format!("/api/v1/registration/{}", name);
        let resp = self
            .client
            .get(self.url(&path))
            .send()
            .await
            .map_err(|e| ClientError::Transport { op: "query_service".into(), source: e })?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { op: "query_service".into(), status, body });
        }
        let info: RegistrationInfo = resp
            .json()
            .await
            .map_err(|e| ClientError::Decode { op: "query_service".into(), source: e })?;
        Ok((info.host, info.port))
    }
}
