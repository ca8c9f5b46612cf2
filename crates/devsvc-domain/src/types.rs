use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::nvpair::{NvList, ProtocolPropertiesList};

// ── Identifiers ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(s: impl Into<String>) -> Self {
        DeviceId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileId(pub String);

impl ProfileId {
    pub fn new(s: impl Into<String>) -> Self {
        ProfileId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProfileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatcherId(pub String);

impl WatcherId {
    pub fn new(s: impl Into<String>) -> Self {
        WatcherId(s.into())
    }
}

impl std::fmt::Display for WatcherId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Administrative / operational state ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminState {
    Locked,
    Unlocked,
}

impl Default for AdminState {
    fn default() -> Self {
        AdminState::Unlocked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperState {
    Enabled,
    Disabled,
}

impl Default for OperState {
    fn default() -> Self {
        OperState::Enabled
    }
}

// ── Addressable ───────────────────────────────────────────────────────────────

/// A metadata entity describing a network endpoint other services can call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addressable {
    pub name: String,
    pub method: String,
    pub protocol: String,
    pub address: String,
    pub port: u16,
    pub path: String,
    /// Creation timestamp in milliseconds since the epoch.
    pub origin: i64,
}

impl Addressable {
    /// Addressable for the callback channel registered at bring-up.
    pub fn callback(service_name: &str, host: &str, port: u16, origin: DateTime<Utc>) -> Self {
        Self {
            name: service_name.to_string(),
            method: "POST".to_string(),
            protocol: "HTTP".to_string(),
            address: host.to_string(),
            port,
            path: "/api/v1/callback".to_string(),
            origin: origin.timestamp_millis(),
        }
    }

    /// True if `host`/`port` differ from this addressable's — the only
    /// fields ever reconciled. Drift in path/method/protocol is never
    /// reconciled against a running registration.
    pub fn differs_in_host_or_port(&self, host: &str, port: u16) -> bool {
        self.address != host || self.port != port
    }
}

// ── Device Profile ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    pub name: String,
    pub readable: bool,
    pub writable: bool,
}

/// A command derived from a profile's resource definitions: one GET
/// command for every readable resource and one PUT for every writable one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub resource_name: String,
    pub get: bool,
    pub put: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub id: ProfileId,
    pub name: String,
    pub resources: Vec<ResourceDefinition>,
    pub commands: Vec<CommandDefinition>,
}

impl DeviceProfile {
    /// Derive the command list from the resource list. Called once at
    /// profile import; `commands` is then carried alongside `resources`
    /// rather than recomputed on every lookup.
    pub fn derive_commands(resources: &[ResourceDefinition]) -> Vec<CommandDefinition> {
        resources
            .iter()
            .map(|r| CommandDefinition { resource_name: r.name.clone(), get: r.readable, put: r.writable })
            .collect()
    }

    /// Resolve a command by the resource name `post_readings` was called
    /// with. Returns `None` if no resource with that name exists on this
    /// profile.
    pub fn find_command(&self, resource_name: &str) -> Option<&CommandDefinition> {
        self.commands.iter().find(|c| c.resource_name == resource_name)
    }
}

// ── AutoEvent ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoEvent {
    pub resource: String,
    /// Poll interval, e.g. "10s" — parsed by the scheduler, opaque here.
    pub frequency: String,
    pub on_change: bool,
}

// ── Device ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub admin_state: AdminState,
    pub oper_state: OperState,
    pub protocols: ProtocolPropertiesList,
    /// Resolved profile. Invariant: every device in the map has this set;
    /// `None` only transiently while importing.
    pub profile: Option<DeviceProfile>,
    pub autoevents: Vec<AutoEvent>,
    pub labels: Vec<String>,
}

impl Device {
    pub fn has_resolved_profile(&self) -> bool {
        self.profile.is_some()
    }
}

/// A device statically declared in the configuration file's `DeviceList`.
/// Opaque to the core beyond name/profile/protocols/labels; the
/// configuration resolver passes these through for the lifecycle engine
/// to reconcile against what metadata reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub name: String,
    pub profile_name: String,
    pub protocols: ProtocolPropertiesList,
    pub labels: Vec<String>,
}

// ── Provision Watcher ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionWatcher {
    pub id: WatcherId,
    pub name: String,
    pub profile_name: String,
    /// Protocol-match rules: e.g. `{"address": "192.168.1.*"}`.
    pub identifiers: NvList,
    pub blocking: bool,
}

// ── Device Service record (metadata) ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceServiceRecord {
    pub id: String,
    pub name: String,
    pub labels: Vec<String>,
    pub admin_state: AdminState,
    pub oper_state: OperState,
    pub addressable: Addressable,
    pub created: i64,
    pub modified: i64,
}

// ── Metadata callback events ───────────────────────────────────────────────────

/// Add/update/delete notification delivered to the callback handler by
/// metadata when a device's record changes there. The lifecycle engine's
/// callback handler applies these directly to the device map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum DeviceCallbackEvent {
    Add(Device),
    Update(Device),
    Delete { id: DeviceId },
}

// ── Raw Reading / Cooked Event ─────────────────────────────────────────────────

/// A single value a driver has read off a device. Pushed by the driver
/// into the lifecycle engine, which cooks it into a [`CookedEvent`]
/// before handing it to the posting pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReading {
    pub device_name: String,
    pub resource_name: String,
    pub value: serde_json::Value,
}

/// A serialized event payload produced by the driver-side data pipeline,
/// ready to hand to the Data client. Opaque to everything except the
/// Data client, which marshals it for transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookedEvent {
    pub device_name: String,
    pub resource_name: String,
    pub origin: i64,
    pub payload: serde_json::Value,
}

// ── Effective Configuration ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub connect_retries: u32,
    pub connect_timeout_secs: u64,
    pub health_check_interval_secs: u64,
    pub labels: Vec<String>,
    pub startup_message: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 49990,
            connect_retries: 5,
            connect_timeout_secs: 1,
            health_check_interval_secs: 10,
            labels: Vec::new(),
            startup_message: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
}

impl EndpointConfig {
    pub fn is_set(&self) -> bool {
        !self.host.is_empty() && self.port != 0
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointsConfig {
    pub metadata: EndpointConfig,
    pub data: EndpointConfig,
    pub logging: EndpointConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub file: Option<String>,
    pub level: String,
    pub use_remote: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { file: None, level: "info".to_string(), use_remote: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSectionConfig {
    pub profiles_dir: PathBuf,
    pub data_transform: bool,
}

impl Default for DeviceSectionConfig {
    fn default() -> Self {
        Self { profiles_dir: PathBuf::from("./res/profiles"), data_transform: true }
    }
}

/// The fully-resolved configuration record a bring-up can rely on being
/// completely populated by the time the configuration resolver returns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub service: ServiceConfig,
    pub endpoints: EndpointsConfig,
    pub logging: LoggingConfig,
    pub device: DeviceSectionConfig,
    pub driverconf: NvList,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addressable_reconciles_only_host_or_port() {
        let addr = Addressable::callback("svc", "10.0.0.1", 49990, Utc::now());
        assert!(!addr.differs_in_host_or_port("10.0.0.1", 49990));
        assert!(addr.differs_in_host_or_port("10.0.0.2", 49990));
        assert!(addr.differs_in_host_or_port("10.0.0.1", 49991));
    }

    #[test]
    fn profile_derives_commands_from_resources() {
        let resources = vec![
            ResourceDefinition { name: "temperature".into(), readable: true, writable: false },
            ResourceDefinition { name: "setpoint".into(), readable: true, writable: true },
        ];
        let commands = DeviceProfile::derive_commands(&resources);
        let profile = DeviceProfile { id: ProfileId::new("p1"), name: "p1".into(), resources, commands };

        let cmd = profile.find_command("setpoint").unwrap();
        assert!(cmd.get && cmd.put);

        let cmd = profile.find_command("temperature").unwrap();
        assert!(cmd.get && !cmd.put);

        assert!(profile.find_command("missing").is_none());
    }

    #[test]
    fn device_without_profile_reports_unresolved() {
        let device = Device {
            id: DeviceId::new("d1"),
            name: "d1".into(),
            admin_state: AdminState::Unlocked,
            oper_state: OperState::Enabled,
            protocols: ProtocolPropertiesList::new(),
            profile: None,
            autoevents: Vec::new(),
            labels: Vec::new(),
        };
        assert!(!device.has_resolved_profile());
    }
}
