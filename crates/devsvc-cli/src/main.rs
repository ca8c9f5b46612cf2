mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use devsvc_client::{HttpDataClient, HttpLoggingClient, HttpMetadataClient, HttpRegistryClient};
use devsvc_config::{determine_registry_url, resolve, CliArgs};
use devsvc_driver::LocalDriver;
use devsvc_lifecycle::{BringupHooks, ServiceBuilder};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let args: CliArgs = cli.into();

    let (config, device_list) = resolve(&args).await.context("failed to resolve configuration")?;

    let http = reqwest::Client::new();
    let metadata = Arc::new(HttpMetadataClient::new(http.clone(), config.endpoints.metadata.base_url()));
    let data = Arc::new(HttpDataClient::new(http.clone()));
    let driver = Arc::new(LocalDriver::new());

    let registry_url = determine_registry_url(&args, std::path::Path::new(&args.confdir));
    let registry = registry_url
        .map(|url| Arc::new(HttpRegistryClient::new(http.clone(), url)) as Arc<_>);

    let mut builder = ServiceBuilder::new(
        args.name.clone(),
        env!("CARGO_PKG_VERSION"),
        config.clone(),
        device_list,
        driver,
        metadata,
        data,
    )?;

    if let Some(profile) = args.profile.clone() {
        builder = builder.profile(profile);
    }
    if let Some(registry) = registry {
        builder = builder.registry(registry);
    }
    if config.logging.use_remote {
        builder = builder.logging(Arc::new(HttpLoggingClient::new(http.clone(), config.endpoints.logging.clone())));
    }

    let service = builder.build();

    let bind_host = if config.service.host.is_empty() {
        "0.0.0.0".to_string()
    } else {
        config.service.host.clone()
    };
    let bind_port = config.service.port;
    let http_service = service.clone();
    let callback_service = service.clone();
    let remaining_service = service.clone();

    let hooks = BringupHooks {
        http_start: Box::new(move || {
            let app = devsvc_api::build_app(http_service.clone());
            tokio::spawn(async move {
                let addr = format!("{bind_host}:{bind_port}");
                match tokio::net::TcpListener::bind(&addr).await {
                    Ok(listener) => {
                        tracing::info!(%addr, "http control surface listening");
                        if let Err(e) = axum::serve(listener, app).await {
                            tracing::error!(error = %e, "http server exited");
                        }
                    }
                    Err(e) => tracing::error!(%addr, error = %e, "failed to bind http listener"),
                }
            });
        }),
        install_callback_handler: Box::new(move || {
            tracing::debug!(service = callback_service.name(), "callback handler installed");
        }),
        install_remaining_handlers: Box::new(move || {
            tracing::debug!(service = remaining_service.name(), "remaining handlers installed");
        }),
    };

    service.bring_up(hooks).await.context("bring-up failed")?;

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received");
    service.shutdown(false).await;

    Ok(())
}
