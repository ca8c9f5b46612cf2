use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use devsvc_client::{apply_env_overrides, HttpRegistryClient, RegistryClient};
use devsvc_domain::{DeviceDescriptor, EffectiveConfig, EndpointConfig, NvList};
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, RegistryArg};
use crate::error::ConfigError;
use crate::loader::{config_file_path, load_config_file};

const DEFAULT_RETRY_COUNT: u32 = 5;
const DEFAULT_RETRY_WAIT_SECS: u64 = 1;
const ENV_OVERRIDE_PREFIX: &str = "DEVICE_OVERRIDE_";

/// Determine the registry URL to use, honoring the three-way
/// presence/value state of `-r/--registry`:
/// - not provided: no registry is used at all.
/// - provided with no value: consult `edgex_registry`, then the file's
///   `[Registry]` table.
/// - provided with a value: use it verbatim.
pub fn determine_registry_url(args: &CliArgs, confdir: &Path) -> Option<String> {
    match &args.registry {
        RegistryArg::Url(url) => Some(url.clone()),
        RegistryArg::NotProvided => None,
        RegistryArg::Empty => {
            if let Ok(url) = std::env::var("edgex_registry") {
                if !url.is_empty() {
                    return Some(url);
                }
            }
            let path = config_file_path(confdir, args.profile.as_deref());
            let text = std::fs::read_to_string(&path).ok()?;
            let raw: crate::raw::RawConfigFile = toml::from_str(&text).ok()?;
            raw.registry.map(|r| format!("http://{}:{}", r.host, r.port))
        }
    }
}

/// Run the configuration resolver end to end, constructing a production
/// registry client when a registry URL is determined.
pub async fn resolve(args: &CliArgs) -> Result<(EffectiveConfig, Vec<DeviceDescriptor>), ConfigError> {
    let confdir = Path::new(&args.confdir);
    let registry_url = determine_registry_url(args, confdir);
    let registry: Option<Arc<dyn RegistryClient>> = registry_url.map(|url| {
        Arc::new(HttpRegistryClient::new(reqwest::Client::new(), url)) as Arc<dyn RegistryClient>
    });
    resolve_with_registry(args, registry).await
}

/// Core resolver algorithm, parameterized over an already-constructed
/// registry client so tests can inject a fake one. `registry: None`
/// means no registry is configured at all.
pub async fn resolve_with_registry(
    args: &CliArgs,
    registry: Option<Arc<dyn RegistryClient>>,
) -> Result<(EffectiveConfig, Vec<DeviceDescriptor>), ConfigError> {
    let confdir = Path::new(&args.confdir);
    let file_path = config_file_path(confdir, args.profile.as_deref());

    let Some(registry) = registry else {
        if matches!(args.registry, RegistryArg::Empty) {
            return Err(ConfigError::InvalidArg(
                "registry requested via bare -r/--registry but no URL could be resolved from \
                 edgex_registry or the configuration file's [Registry] table"
                    .to_string(),
            ));
        }
        info!("no registry configured, using file-based configuration only");
        let (config, devices, _flat) = load_config_file(&file_path)?;
        return Ok((config, devices));
    };

    let retries = std::env::var("edgex_registry_retry_count")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_RETRY_COUNT);
    let wait_secs = std::env::var("edgex_registry_retry_wait")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_RETRY_WAIT_SECS);

    ping_with_retry(registry.as_ref(), retries, Duration::from_secs(wait_secs)).await?;

    match registry.get_config(&args.name, args.profile.as_deref().unwrap_or("default")).await? {
        Some(nv) => {
            debug!("registry returned existing configuration");
            let mut config = apply_nvlist_to_effective_config(EffectiveConfig::default(), &nv);
            let devices = load_config_file(&file_path).map(|(_, d, _)| d).unwrap_or_default();
            query_endpoints(registry.as_ref(), &mut config).await;
            Ok((config, devices))
        }
        None => {
            info!("registry has no stored configuration, uploading file-derived defaults");
            let (mut config, devices, mut flat) = load_config_file(&file_path)?;
            apply_env_overrides(&mut flat, ENV_OVERRIDE_PREFIX);
            if let Err(e) = registry
                .put_config(&args.name, args.profile.as_deref().unwrap_or("default"), &flat)
                .await
            {
                warn!(error = %e, "failed to upload initial configuration to registry");
            }
            query_endpoints(registry.as_ref(), &mut config).await;
            Ok((config, devices))
        }
    }
}

async fn ping_with_retry(
    registry: &dyn RegistryClient,
    retries: u32,
    wait: Duration,
) -> Result<(), ConfigError> {
    for attempt in 0..=retries {
        if registry.ping().await {
            return Ok(());
        }
        if attempt < retries {
            tokio::time::sleep(wait).await;
        }
    }
    Err(ConfigError::RemoteServerDown("registry".to_string()))
}

/// Overlay dotted keys produced by [`crate::loader::flatten_raw`]-shaped
/// name/value lists onto a base configuration. Unknown keys are ignored.
fn apply_nvlist_to_effective_config(mut config: EffectiveConfig, nv: &NvList) -> EffectiveConfig {
    if let Some(host) = nv.get("service.host") {
        config.service.host = host.to_string();
    }
    if let Some(port) = nv.get_u64("service.port") {
        config.service.port = port as u16;
    }
    if let Some(level) = nv.get("logging.level") {
        config.logging.level = level.to_string();
    }
    if let Some(use_remote) = nv.get("logging.use_remote") {
        config.logging.use_remote = use_remote == "true";
    }
    config.driverconf = nv.clone();
    config
}

async fn query_endpoints(registry: &dyn RegistryClient, config: &mut EffectiveConfig) {
    for (label, endpoint) in [
        ("metadata", &mut config.endpoints.metadata),
        ("data", &mut config.endpoints.data),
        ("logging", &mut config.endpoints.logging),
    ] {
        match registry.query_service(label).await {
            Ok((host, port)) => *endpoint = EndpointConfig { host, port },
            Err(e) => debug!(service = label, error = %e, "endpoint query failed, keeping file default"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use devsvc_client::ClientError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn write_file(dir: &tempfile::TempDir, contents: &str) {
        std::fs::write(dir.path().join("configuration.toml"), contents).unwrap();
    }

    fn args(confdir: &tempfile::TempDir, registry: RegistryArg) -> CliArgs {
        CliArgs {
            name: "test-service".to_string(),
            registry,
            profile: None,
            confdir: confdir.path().to_string_lossy().to_string(),
        }
    }

    struct FakeRegistry {
        pingable: bool,
        config: Mutex<Option<NvList>>,
        put_calls: AtomicUsize,
    }

    #[async_trait]
    impl RegistryClient for FakeRegistry {
        async fn ping(&self) -> bool {
            self.pingable
        }
        async fn get_config(&self, _name: &str, _profile: &str) -> Result<Option<NvList>, ClientError> {
            Ok(self.config.lock().unwrap().clone())
        }
        async fn put_config(&self, _name: &str, _profile: &str, config: &NvList) -> Result<(), ClientError> {
            self.put_calls.fetch_add(1, Ordering::SeqCst);
            *self.config.lock().unwrap() = Some(config.clone());
            Ok(())
        }
        async fn register_service(&self, _: &str, _: &str, _: u16, _: u64) -> Result<(), ClientError> {
            Ok(())
        }
        async fn deregister_service(&self, _: &str) -> Result<(), ClientError> {
            Ok(())
        }
        async fn query_service(&self, _name: &str) -> Result<(String, u16), ClientError> {
            Ok(("resolved-host".to_string(), 9999))
        }
    }

    #[tokio::test]
    async fn no_registry_loads_file_only() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir,
            r#"
                [Clients.Metadata]
                host = "localhost"
                port = 48081
                [Clients.Data]
                host = "localhost"
                port = 48080
            "#,
        );
        let (config, _) = resolve_with_registry(&args(&dir, RegistryArg::NotProvided), None)
            .await
            .unwrap();
        assert_eq!(config.endpoints.metadata.port, 48081);
    }

    #[tokio::test]
    async fn bare_registry_flag_unresolvable_fails_with_invalid_arg() {
        std::env::remove_var("edgex_registry");
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir,
            r#"
                [Clients.Metadata]
                host = "localhost"
                port = 48081
                [Clients.Data]
                host = "localhost"
                port = 48080
            "#,
        );
        let result = resolve_with_registry(&args(&dir, RegistryArg::Empty), None).await;
        assert!(matches!(result, Err(ConfigError::InvalidArg(_))));
    }

    #[tokio::test]
    async fn registry_cold_start_uploads_file_config() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir,
            r#"
                [service]
                host = "0.0.0.0"
                port = 49990
                [Clients.Metadata]
                host = "localhost"
                port = 48081
                [Clients.Data]
                host = "localhost"
                port = 48080
            "#,
        );
        let registry = Arc::new(FakeRegistry {
            pingable: true,
            config: Mutex::new(None),
            put_calls: AtomicUsize::new(0),
        });
        let (config, _) = resolve_with_registry(
            &args(&dir, RegistryArg::Url("http://reg".to_string())),
            Some(registry.clone()),
        )
        .await
        .unwrap();
        assert_eq!(registry.put_calls.load(Ordering::SeqCst), 1);
        assert_eq!(config.endpoints.metadata.host, "resolved-host");
    }

    #[tokio::test]
    async fn registry_with_existing_config_skips_upload() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir, "");
        let mut nv = NvList::new();
        nv.push("service.host", "stored-host");
        let registry = Arc::new(FakeRegistry {
            pingable: true,
            config: Mutex::new(Some(nv)),
            put_calls: AtomicUsize::new(0),
        });
        let (config, _) = resolve_with_registry(
            &args(&dir, RegistryArg::Url("http://reg".to_string())),
            Some(registry.clone()),
        )
        .await
        .unwrap();
        assert_eq!(registry.put_calls.load(Ordering::SeqCst), 0);
        assert_eq!(config.service.host, "stored-host");
    }

    #[tokio::test]
    async fn unreachable_registry_fails_with_remote_server_down() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir, "");
        std::env::set_var("edgex_registry_retry_count", "0");
        std::env::set_var("edgex_registry_retry_wait", "0");
        let registry = Arc::new(FakeRegistry {
            pingable: false,
            config: Mutex::new(None),
            put_calls: AtomicUsize::new(0),
        });
        let result = resolve_with_registry(
            &args(&dir, RegistryArg::Url("http://reg".to_string())),
            Some(registry),
        )
        .await;
        assert!(matches!(result, Err(ConfigError::RemoteServerDown(_))));
        std::env::remove_var("edgex_registry_retry_count");
        std::env::remove_var("edgex_registry_retry_wait");
    }
}
