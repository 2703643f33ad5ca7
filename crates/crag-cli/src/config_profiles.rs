//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crag_core::util::normalize_text_option;
use crag_core::ClientConfig;
use serde::{Deserialize, Serialize};

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "cli-config.json";
const PROFILE_ENV: &str = "CRAG_PROFILE";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

/// One catalog server and where its data lives.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub image_width: Option<u32>,
}

impl std::fmt::Debug for CliProfile {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("CliProfile")
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("data_dir", &self.data_dir)
            .field("image_width", &self.image_width)
            .finish()
    }
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("crag")
        .join(CONFIG_FILE_NAME)
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("crag")
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    normalize_text_option(value.map(str::to_string))
}

fn config_error(action: &str, path: &Path, error: impl std::fmt::Display) -> CliError {
    CliError::Config(format!("Failed to {action} {}: {error}", path.display()))
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, CliError> {
        Self::load_from_path(&default_config_path())
    }

    /// A missing file is an empty config.
    pub fn load_from_path(path: &Path) -> Result<Self, CliError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(error) => return Err(config_error("read profiles at", path, error)),
        };
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| config_error("parse profiles at", path, error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, CliError> {
        let path = default_config_path();
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), CliError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|error| config_error("create config directory", parent, error))?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)?;
        std::fs::write(path, serialized)
            .map_err(|error| config_error("write profiles at", path, error))
    }

    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        if let Some(profile) = normalize_profile_name(explicit) {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(std::env::var(PROFILE_ENV).ok().as_deref()) {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(self.active_profile.as_deref()) {
            return profile;
        }
        "default".to_string()
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    /// Core client config for this profile, before environment overrides.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            api_base_url: self.api_base_url.clone().unwrap_or_default(),
            api_key: self.api_key.clone(),
            data_dir: self.data_dir.clone(),
            image_width: self.image_width,
        }
    }

    fn normalize(&mut self) {
        self.api_base_url = normalize_text_option(self.api_base_url.clone())
            .map(|url| url.trim_end_matches('/').to_string());
        self.api_key = normalize_text_option(self.api_key.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn normalize_profile_name_rejects_empty() {
        assert_eq!(normalize_profile_name(None), None);
        assert_eq!(normalize_profile_name(Some(" ")), None);
    }

    #[test]
    fn config_roundtrip_preserves_profiles() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("cli-config.json");

        let mut config = CliProfilesConfig {
            version: 1,
            active_profile: Some(" default ".to_string()),
            profiles: BTreeMap::new(),
        };
        config.profiles.insert(
            "default".to_string(),
            CliProfile {
                api_base_url: Some(" https://api.example.com/ ".to_string()),
                api_key: Some("  ".to_string()),
                data_dir: None,
                image_width: Some(512),
            },
        );

        config.save_to_path(&path).unwrap();
        let loaded = CliProfilesConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.active_profile.as_deref(), Some("default"));
        let profile = loaded.profile("default").unwrap();
        assert_eq!(profile.api_base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(profile.api_key, None);
        assert_eq!(profile.image_width, Some(512));
    }

    #[test]
    fn missing_file_is_empty_config() {
        let tmp = tempdir().unwrap();
        let loaded = CliProfilesConfig::load_from_path(&tmp.path().join("absent.json")).unwrap();
        assert_eq!(loaded, CliProfilesConfig::default());
    }

    #[test]
    fn unparsable_file_is_config_error() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("cli-config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = CliProfilesConfig::load_from_path(&path).unwrap_err();
        assert!(matches!(err, CliError::Config(message) if message.contains("parse profiles")));
    }

    #[test]
    fn resolve_profile_name_prefers_explicit_then_active() {
        let config = CliProfilesConfig {
            version: 1,
            active_profile: Some("club".to_string()),
            profiles: BTreeMap::new(),
        };
        assert_eq!(config.resolve_profile_name(Some("guide")), "guide");
        if std::env::var(PROFILE_ENV).is_err() {
            assert_eq!(config.resolve_profile_name(None), "club");
        }
    }

    #[test]
    fn profile_maps_to_client_config() {
        let profile = CliProfile {
            api_base_url: Some("https://api.example.com".to_string()),
            api_key: Some("s3cret".to_string()),
            data_dir: Some(PathBuf::from("/tmp/crag")),
            image_width: None,
        };
        let config = profile.to_client_config();
        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.api_key.as_deref(), Some("s3cret"));
        assert!(!format!("{profile:?}").contains("s3cret"));
    }
}
