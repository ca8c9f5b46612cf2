use std::time::Duration;

use tracing::{debug, warn};

use crate::error::ClientError;

/// Issue an HTTP GET to `{base_url}/api/v1/ping`, retrying up to `retries`
/// additional times with `delay` between attempts. Returns as soon
/// as any attempt succeeds. Cancellation is not supported; bring-up is
/// sequential and this call blocks the caller.
pub async fn ping_with_retry(
    client: &reqwest::Client,
    base_url: &str,
    retries: u32,
    delay: Duration,
) -> Result<(), ClientError> {
    let url = format!("{}/api/v1/ping", base_url.trim_end_matches('/'));
    let attempts = retries + 1;

    for attempt in 0..attempts {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(url = %url, attempt, "ping succeeded");
                return Ok(());
            }
            Ok(resp) => {
                warn!(url = %url, attempt, status = %resp.status(), "ping returned non-success status");
            }
            Err(e) => {
                warn!(url = %url, attempt, error = %e, "ping request failed");
            }
        }
        if attempt + 1 < attempts {
            tokio::time::sleep(delay).await;
        }
    }

    Err(ClientError::RemoteServerDown(base_url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn succeeds_on_first_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/ping"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let result = ping_with_retry(&client, &server.uri(), 3, Duration::from_millis(1)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn fails_with_remote_server_down_after_exhausting_retries() {
        let client = reqwest::Client::new();
        // Nothing listening on this port.
        let result =
            ping_with_retry(&client, "http://127.0.0.1:1", 2, Duration::from_millis(1)).await;
        assert!(matches!(result, Err(ClientError::RemoteServerDown(_))));
    }
}
