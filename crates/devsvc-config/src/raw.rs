use std::collections::BTreeMap;

use serde::Deserialize;

/// Raw deserialization shape of `configuration.toml`. All fields are
/// optional at this layer; absence is resolved to defaults when
/// converting into [`devsvc_domain::EffectiveConfig`].
#[derive(Debug, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub service: Option<RawService>,
    #[serde(default, rename = "Clients")]
    pub clients: BTreeMap<String, RawEndpoint>,
    #[serde(default, rename = "Registry")]
    pub registry: Option<RawEndpoint>,
    #[serde(default)]
    pub logging: Option<RawLogging>,
    #[serde(default)]
    pub device: Option<RawDeviceSection>,
    #[serde(default, rename = "DeviceList")]
    pub device_list: Vec<RawDeviceDescriptor>,
    /// Opaque driver configuration, passed through verbatim as the
    /// effective configuration's `driverconf` name/value list.
    #[serde(default, rename = "Driver")]
    pub driver: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Deserialize)]
pub struct RawService {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub connect_retries: Option<u32>,
    #[serde(default)]
    pub connect_timeout: Option<u64>,
    #[serde(default)]
    pub health_check_interval: Option<u64>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub startup_msg: String,
}

#[derive(Debug, Deserialize)]
pub struct RawEndpoint {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct RawLogging {
    #[serde(default)]
    pub file: String,
    pub level: Option<String>,
    #[serde(default)]
    pub use_remote: bool,
}

#[derive(Debug, Deserialize)]
pub struct RawDeviceSection {
    pub profiles_dir: Option<String>,
    pub data_transform: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct RawDeviceDescriptor {
    pub name: String,
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub protocols: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub labels: Vec<String>,
}
