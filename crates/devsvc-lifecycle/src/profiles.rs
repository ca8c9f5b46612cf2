use std::collections::HashMap;
use std::path::Path;

use devsvc_domain::{DeviceProfile, ProfileId, ResourceDefinition};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::LifecycleError;

#[derive(Deserialize)]
struct RawProfile {
    id: String,
    name: String,
    #[serde(default)]
    resources: Vec<RawResource>,
}

#[derive(Deserialize)]
struct RawResource {
    name: String,
    #[serde(default)]
    readable: bool,
    #[serde(default)]
    writable: bool,
}

/// Load every `*.json` profile file in `dir`, keyed by profile name.
/// A profile file that fails to parse is logged and skipped; it is not
/// fatal to bring-up.
pub fn load_profiles_from_dir(dir: &Path) -> Result<HashMap<String, DeviceProfile>, LifecycleError> {
    let mut profiles = HashMap::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "profiles directory unreadable, continuing with none");
            return Ok(profiles);
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match load_one(&path) {
            Ok(profile) => {
                debug!(profile = %profile.name, "loaded device profile");
                profiles.insert(profile.name.clone(), profile);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "failed to load profile, skipping"),
        }
    }
    Ok(profiles)
}

fn load_one(path: &Path) -> Result<DeviceProfile, LifecycleError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| LifecycleError::Internal(format!("{}: {e}", path.display())))?;
    let raw: RawProfile = serde_json::from_str(&text)
        .map_err(|e| LifecycleError::Internal(format!("{}: {e}", path.display())))?;
    let resources: Vec<ResourceDefinition> = raw
        .resources
        .into_iter()
        .map(|r| ResourceDefinition { name: r.name, readable: r.readable, writable: r.writable })
        .collect();
    let commands = DeviceProfile::derive_commands(&resources);
    Ok(DeviceProfile { id: ProfileId::new(raw.id), name: raw.name, resources, commands })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_valid_profiles_and_skips_bad_ones() {
        let dir = tempfile_dir();
        std::fs::write(
            dir.path().join("temperature.json"),
            r#"{"id": "p1", "name": "temperature", "resources": [{"name": "temp", "readable": true, "writable": false}]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), "not json").unwrap();

        let profiles = load_profiles_from_dir(dir.path()).unwrap();
        assert_eq!(profiles.len(), 1);
        assert!(profiles.contains_key("temperature"));
    }

    #[test]
    fn missing_directory_returns_empty_map_not_error() {
        let profiles = load_profiles_from_dir(Path::new("/nonexistent/profiles")).unwrap();
        assert!(profiles.is_empty());
    }

    fn tempfile_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }
}
