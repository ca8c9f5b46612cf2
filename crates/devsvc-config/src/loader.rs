use std::path::{Path, PathBuf};

use devsvc_domain::{
    DeviceDescriptor, DeviceSectionConfig, EffectiveConfig, EndpointConfig, EndpointsConfig,
    LoggingConfig, NvList, ProtocolPropertiesList, ServiceConfig,
};
use tracing::debug;

use crate::error::ConfigError;
use crate::raw::{RawConfigFile, RawDeviceDescriptor};

/// Resolve `{confdir}/{profile?}/configuration.toml`.
pub fn config_file_path(confdir: &Path, profile: Option<&str>) -> PathBuf {
    match profile {
        Some(p) if !p.is_empty() => confdir.join(p).join("configuration.toml"),
        _ => confdir.join("configuration.toml"),
    }
}

/// Load and parse `configuration.toml`, returning the typed effective
/// configuration, the statically declared device list, and a flat
/// name/value rendering of the whole file (used for first-run registry
/// upload).
pub fn load_config_file(
    path: &Path,
) -> Result<(EffectiveConfig, Vec<DeviceDescriptor>, NvList), ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    debug!(path = %path.display(), "loaded configuration file");

    let raw: RawConfigFile = toml::from_str(&text).map_err(|e| ConfigError::TomlParse {
        path: path.display().to_string(),
        source: e,
    })?;

    let flat = flatten_raw(&raw);
    let device_list = raw.device_list.iter().map(convert_device_descriptor).collect();
    let effective = convert_effective(raw);
    Ok((effective, device_list, flat))
}

fn convert_effective(raw: RawConfigFile) -> EffectiveConfig {
    let mut service = ServiceConfig::default();
    if let Some(s) = raw.service {
        service.host = s.host;
        if let Some(port) = s.port {
            service.port = port;
        }
        if let Some(retries) = s.connect_retries {
            service.connect_retries = retries;
        }
        if let Some(timeout) = s.connect_timeout {
            service.connect_timeout_secs = timeout;
        }
        if let Some(interval) = s.health_check_interval {
            service.health_check_interval_secs = interval;
        }
        service.labels = s.labels;
        service.startup_message = s.startup_msg;
    }

    let mut endpoints = EndpointsConfig::default();
    for (name, ep) in &raw.clients {
        let endpoint = EndpointConfig { host: ep.host.clone(), port: ep.port };
        match name.to_lowercase().as_str() {
            "metadata" => endpoints.metadata = endpoint,
            "data" => endpoints.data = endpoint,
            "logging" => endpoints.logging = endpoint,
            _ => {}
        }
    }

    let mut logging = LoggingConfig::default();
    if let Some(l) = raw.logging {
        logging.file = l.file;
        if let Some(level) = l.level {
            logging.level = level;
        }
        logging.use_remote = l.use_remote;
    }

    let mut device = DeviceSectionConfig::default();
    if let Some(d) = raw.device {
        if let Some(dir) = d.profiles_dir {
            device.profiles_dir = PathBuf::from(dir);
        }
        if let Some(dt) = d.data_transform {
            device.data_transform = dt;
        }
    }

    let driverconf = NvList::from_pairs(
        raw.driver
            .into_iter()
            .map(|(k, v)| (k, toml_value_to_string(v))),
    );

    EffectiveConfig { service, endpoints, logging, device, driverconf }
}

fn convert_device_descriptor(raw: &RawDeviceDescriptor) -> DeviceDescriptor {
    let mut protocols = ProtocolPropertiesList::new();
    for (protocol_name, props) in &raw.protocols {
        protocols.push(protocol_name.clone(), NvList::from_pairs(props.clone()));
    }
    DeviceDescriptor {
        name: raw.name.clone(),
        profile_name: raw.profile.clone(),
        protocols,
        labels: raw.labels.clone(),
    }
}

fn toml_value_to_string(v: toml::Value) -> String {
    match v {
        toml::Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Render the whole raw file as a flat name/value list, for upload to the
/// registry on first run. Nested tables are not expanded beyond the
/// `Driver` table and top-level service fields; this is sufficient for
/// round-tripping what the core itself consumes.
fn flatten_raw(raw: &RawConfigFile) -> NvList {
    let mut nv = NvList::new();
    if let Some(s) = &raw.service {
        nv.push("service.host", s.host.clone());
        if let Some(port) = s.port {
            nv.push("service.port", port.to_string());
        }
    }
    for (name, ep) in &raw.clients {
        nv.push(format!("clients.{name}.host"), ep.host.clone());
        nv.push(format!("clients.{name}.port"), ep.port.to_string());
    }
    if let Some(l) = &raw.logging {
        if let Some(level) = &l.level {
            nv.push("logging.level", level.clone());
        }
        nv.push("logging.use_remote", l.use_remote.to_string());
    }
    for (k, v) in &raw.driver {
        nv.push(format!("driver.{k}"), toml_value_to_string(v.clone()));
    }
    nv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_file() {
        let toml_text = r#"
            [service]
            host = "0.0.0.0"
            port = 49990

            [Clients.Metadata]
            host = "localhost"
            port = 48081

            [Clients.Data]
            host = "localhost"
            port = 48080
        "#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configuration.toml");
        std::fs::write(&path, toml_text).unwrap();

        let (config, devices, flat) = load_config_file(&path).unwrap();
        assert_eq!(config.service.port, 49990);
        assert_eq!(config.endpoints.metadata.port, 48081);
        assert_eq!(config.endpoints.data.port, 48080);
        assert!(devices.is_empty());
        assert_eq!(flat.get("service.host"), Some("0.0.0.0"));
    }

    #[test]
    fn parses_device_list_and_driver_table() {
        let toml_text = r#"
            [Clients.Metadata]
            host = "localhost"
            port = 48081
            [Clients.Data]
            host = "localhost"
            port = 48080

            [[DeviceList]]
            name = "sensor-1"
            profile = "temperature"
            [DeviceList.protocols.rest]
            address = "10.0.0.5"

            [Driver]
            poll_interval_ms = "500"
        "#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configuration.toml");
        std::fs::write(&path, toml_text).unwrap();

        let (config, devices, _flat) = load_config_file(&path).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "sensor-1");
        assert_eq!(
            devices[0].protocols.get("rest").and_then(|p| p.get("address")),
            Some("10.0.0.5")
        );
        assert_eq!(config.driverconf.get("poll_interval_ms"), Some("500"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = load_config_file(Path::new("/nonexistent/configuration.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
