use async_trait::async_trait;
use devsvc_domain::{NvList, RawReading};
use tokio::sync::mpsc;

/// Contract the lifecycle engine drives on the single protocol driver
/// injected into a service instance. Bring-up calls `init` exactly once;
/// shutdown calls `stop` exactly once, regardless of whether `init`
/// returned `true`.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Start the driver. `driver_config` is the opaque name/value list
    /// carried in the effective configuration's `driverconf`. `readings`
    /// is the channel the driver pushes `RawReading`s into for as long as
    /// it runs. Returns `false` to abort bring-up.
    async fn init(&self, driver_config: &NvList, readings: mpsc::UnboundedSender<RawReading>) -> bool;

    /// Stop the driver. `force` requests an immediate stop over a graceful
    /// drain when the two differ.
    async fn stop(&self, force: bool);

    /// On-demand resource read, driven by the Scheduler on a device's
    /// autoevent interval. Returns `None` if the driver has nothing to
    /// report for this device/resource right now. Drivers that only ever
    /// push readings through `init`'s channel can leave this at its
    /// default.
    async fn read(&self, _device_name: &str, _resource_name: &str) -> Option<serde_json::Value> {
        None
    }
}
