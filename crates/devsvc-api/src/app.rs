use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Router;
use devsvc_lifecycle::Service;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::handlers;
use crate::state::AppState;

/// Reject traffic the engine isn't ready for yet: the callback path opens
/// as soon as the callback handler is installed during bring-up, every
/// other path waits for the remaining handlers to install (§4.10's
/// strict bring-up order).
async fn require_ready(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path();
    let ready = if path == "/api/v1/ping" {
        true
    } else if path == "/api/v1/callback" {
        state.service.is_callback_ready()
    } else {
        state.service.is_fully_ready()
    };
    if !ready {
        return ApiError::service_unavailable("device service is not yet ready").into_response();
    }
    next.run(req).await
}

pub fn build_app(service: Arc<Service>) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/api/v1/ping", get(handlers::ping))
        .route("/api/version", get(handlers::version))
        .route("/api/v1/discovery", post(handlers::post_discovery))
        .route(
            "/api/v1/device/:device_name/:command",
            get(handlers::get_device_command).put(handlers::set_device_command).post(handlers::set_device_command),
        )
        .route(
            "/api/v1/callback",
            put(handlers::callback).post(handlers::callback).delete(handlers::callback),
        )
        .route("/api/v1/config", get(handlers::config))
        .route("/api/v1/metrics", get(handlers::metrics))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_ready))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use devsvc_client::{ClientError, DataClient, MetadataClient};
    use devsvc_domain::{
        Addressable, CookedEvent, Device, DeviceServiceRecord, EffectiveConfig, EndpointConfig,
        NvList, ProvisionWatcher, RawReading,
    };
    use devsvc_driver::Driver;
    use devsvc_lifecycle::{BringupHooks, ServiceBuilder};
    use tokio::sync::mpsc::UnboundedSender;
    use tower::util::ServiceExt;

    struct EmptyMetadata;

    #[async_trait]
    impl MetadataClient for EmptyMetadata {
        async fn get_deviceservice(&self, _name: &str) -> Result<Option<DeviceServiceRecord>, ClientError> {
            Ok(None)
        }
        async fn get_addressable(&self, _name: &str) -> Result<Option<Addressable>, ClientError> {
            Ok(None)
        }
        async fn create_addressable(&self, _addr: &Addressable) -> Result<String, ClientError> {
            Ok("a1".into())
        }
        async fn update_addressable(&self, _addr: &Addressable) -> Result<(), ClientError> {
            Ok(())
        }
        async fn create_deviceservice(&self, _ds: &DeviceServiceRecord) -> Result<String, ClientError> {
            Ok("ds1".into())
        }
        async fn get_devices(&self, _service_name: &str) -> Result<Vec<Device>, ClientError> {
            Ok(vec![])
        }
        async fn get_watchers(&self, _service_name: &str) -> Result<Vec<ProvisionWatcher>, ClientError> {
            Ok(vec![])
        }
    }

    struct NoopData;

    #[async_trait]
    impl DataClient for NoopData {
        async fn add_event(&self, _endpoint: &EndpointConfig, _event: &CookedEvent) -> Result<(), ClientError> {
            Ok(())
        }
    }

    struct NoopDriver;

    #[async_trait]
    impl Driver for NoopDriver {
        fn name(&self) -> &'static str {
            "noop"
        }
        async fn init(&self, _config: &NvList, _readings: UnboundedSender<RawReading>) -> bool {
            true
        }
        async fn stop(&self, _force: bool) {}
    }

    fn fresh_service() -> Arc<Service> {
        fresh_service_with_config(EffectiveConfig::default())
    }

    fn fresh_service_with_config(config: EffectiveConfig) -> Arc<Service> {
        ServiceBuilder::new(
            "svc",
            "1.0.0",
            config,
            vec![],
            Arc::new(NoopDriver),
            Arc::new(EmptyMetadata),
            Arc::new(NoopData),
        )
        .unwrap()
        .build()
    }

    async fn pingable_config() -> (wiremock::MockServer, wiremock::MockServer, EffectiveConfig) {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let metadata_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/ping"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&metadata_server)
            .await;
        let data_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/ping"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&data_server)
            .await;

        let parse = |uri: &str| -> EndpointConfig {
            let rest = uri.trim_start_matches("http://");
            let mut parts = rest.splitn(2, ':');
            let host = parts.next().unwrap().to_string();
            let port: u16 = parts.next().unwrap().parse().unwrap();
            EndpointConfig { host, port }
        };

        let mut config = EffectiveConfig::default();
        config.service.host = "127.0.0.1".to_string();
        config.endpoints.metadata = parse(&metadata_server.uri());
        config.endpoints.data = parse(&data_server.uri());
        (metadata_server, data_server, config)
    }

    #[tokio::test]
    async fn ping_is_reachable_before_bring_up() {
        let app = build_app(fresh_service());
        let resp = app
            .oneshot(HttpRequest::builder().uri("/api/v1/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn config_is_unavailable_before_bring_up() {
        let app = build_app(fresh_service());
        let resp = app
            .oneshot(HttpRequest::builder().uri("/api/v1/config").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn callback_is_unavailable_before_bring_up() {
        let app = build_app(fresh_service());
        let body = serde_json::json!({ "action": "delete", "id": "d1" });
        let resp = app
            .oneshot(
                HttpRequest::builder()
                    .method("DELETE")
                    .uri("/api/v1/callback")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn callback_and_config_open_up_after_bring_up() {
        let (_metadata_srv, _data_srv, config) = pingable_config().await;
        let service = fresh_service_with_config(config);
        service.bring_up(BringupHooks::default()).await.unwrap();
        let app = build_app(service);

        let resp = app
            .clone()
            .oneshot(HttpRequest::builder().uri("/api/v1/config").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = serde_json::json!({ "action": "delete", "id": "ghost" });
        let resp = app
            .oneshot(
                HttpRequest::builder()
                    .method("DELETE")
                    .uri("/api/v1/callback")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_device_command_returns_404() {
        let (_metadata_srv, _data_srv, config) = pingable_config().await;
        let service = fresh_service_with_config(config);
        service.bring_up(BringupHooks::default()).await.unwrap();
        let app = build_app(service);

        let resp = app
            .oneshot(HttpRequest::builder().uri("/api/v1/device/ghost/temperature").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
