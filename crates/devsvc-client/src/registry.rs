use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devsvc_domain::NvList;
use devsvc_runtime::WorkerPool;
use tracing::{debug, warn};

use crate::error::ClientError;

/// Contract consumed by the core for the optional service registry /
/// configuration store. Every operation is independently optional;
/// callers decide whether its absence is fatal.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn ping(&self) -> bool;

    /// Fetch the stored configuration for `name`/`profile`. `None` means
    /// first-run (nothing has ever been uploaded).
    async fn get_config(&self, name: &str, profile: &str) -> Result<Option<NvList>, ClientError>;

    async fn put_config(&self, name: &str, profile: &str, config: &NvList) -> Result<(), ClientError>;

    async fn register_service(
        &self,
        name: &str,
        host: &str,
        port: u16,
        health_interval_secs: u64,
    ) -> Result<(), ClientError>;

    async fn deregister_service(&self, name: &str) -> Result<(), ClientError>;

    async fn query_service(&self, name: &str) -> Result<(String, u16), ClientError>;
}

/// Apply environment-sourced overrides to `config` before the first
/// upload to the registry. Any environment variable named
/// `<env_prefix><UPPER_SNAKE_KEY>` replaces (or adds) the pair with
/// that key.
pub fn apply_env_overrides(config: &mut NvList, env_prefix: &str) {
    for (key, value) in std::env::vars() {
        if let Some(name) = key.strip_prefix(env_prefix) {
            let name = name.to_lowercase();
            config.push(name, value);
        }
    }
}

/// Spawn a background task (via `pool`) that polls `client.get_config`
/// every `poll_interval` and invokes `on_update` whenever the returned
/// configuration differs from the last seen one. Terminates once
/// `stop_flag` observes `true` between deliveries.
pub fn watch_config<F>(
    client: Arc<dyn RegistryClient>,
    pool: &WorkerPool,
    name: String,
    profile: String,
    poll_interval: Duration,
    stop_flag: Arc<AtomicBool>,
    mut last_known: NvList,
    on_update: F,
) where
    F: Fn(NvList) + Send + 'static,
{
    let job: devsvc_runtime::Job = Box::new(move || {
        Box::pin(async move {
            loop {
                tokio::time::sleep(poll_interval).await;
                if stop_flag.load(Ordering::SeqCst) {
                    debug!("config watch stopping: stop flag observed");
                    break;
                }
                match client.get_config(&name, &profile).await {
                    Ok(Some(new_config)) if !new_config.set_eq(&last_known) => {
                        last_known = new_config.clone();
                        on_update(new_config);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "config watch poll failed, will retry");
                    }
                }
            }
        })
    });
    if let Err(e) = pool.submit(job) {
        warn!(error = %e, "failed to submit config watch task to worker pool");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_apply_matching_prefix_only() {
        std::env::set_var("DEVICE_OVERRIDE_HOST", "override-host");
        std::env::set_var("UNRELATED_VAR", "x");
        let mut config = NvList::new();
        config.push("host", "original");
        apply_env_overrides(&mut config, "DEVICE_OVERRIDE_");
        assert_eq!(config.get("host"), Some("override-host"));
        std::env::remove_var("DEVICE_OVERRIDE_HOST");
        std::env::remove_var("UNRELATED_VAR");
    }
}
