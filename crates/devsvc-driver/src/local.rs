use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devsvc_domain::{NvList, RawReading};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::sync::Mutex;
use tracing::debug;

use crate::driver::Driver;

/// A stub driver that manufactures synthetic readings on a fixed
/// interval. Used by tests and as a runnable demonstration of the
/// `Driver` contract; performs no real south-bound I/O.
#[derive(Default)]
pub struct LocalDriver {
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LocalDriver {
    pub fn new() -> Self {
        Self { running: Arc::new(AtomicBool::new(false)), task: Mutex::new(None) }
    }
}

#[async_trait]
impl Driver for LocalDriver {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn init(&self, driver_config: &NvList, readings: mpsc::UnboundedSender<RawReading>) -> bool {
        let interval_ms: u64 = driver_config
            .get("poll_interval_ms")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000);

        debug!(interval_ms, "local driver: init");
        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let handle = tokio::spawn(async move {
            let mut tick: u64 = 0;
            while running.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(interval_ms)).await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                tick += 1;
                let reading = RawReading {
                    device_name: "local-device".to_string(),
                    resource_name: "counter".to_string(),
                    value: json!({ "tick": tick }),
                };
                if readings.send(reading).is_err() {
                    break;
                }
            }
        });
        *self.task.lock().await = Some(handle);
        true
    }

    async fn stop(&self, _force: bool) {
        debug!("local driver: stop");
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.task.lock().await.take() {
            let _ = handle.await;
        }
    }

    /// On-demand read for the autoevent scheduler: synthesizes a value
    /// for whichever device/resource was requested rather than polling
    /// real south-bound I/O.
    async fn read(&self, device_name: &str, resource_name: &str) -> Option<serde_json::Value> {
        Some(json!({ "device": device_name, "resource": resource_name, "source": "on-demand" }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_produces_readings_until_stopped() {
        let driver = LocalDriver::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut config = NvList::new();
        config.push("poll_interval_ms", "5");

        assert!(driver.init(&config, tx).await);
        let first = rx.recv().await.expect("expected a reading");
        assert_eq!(first.device_name, "local-device");

        driver.stop(false).await;
    }

    #[tokio::test]
    async fn read_returns_a_synthetic_value() {
        let driver = LocalDriver::new();
        let value = driver.read("sensor-1", "temperature").await.unwrap();
        assert_eq!(value["device"], "sensor-1");
        assert_eq!(value["resource"], "temperature");
    }
}
