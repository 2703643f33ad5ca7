//! Client configuration.
//!
//! A `ClientConfig` names the catalog server, the optional API key used to
//! push edits, where local data lives and the preferred image width. It is
//! read from a JSON file and then overridden by `CRAG_*` environment
//! variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::api::{normalize_base_url, ApiClient};
use crate::error::{Error, Result};
use crate::util::normalize_text_option;

pub const ENV_API_URL: &str = "CRAG_API_URL";
pub const ENV_API_KEY: &str = "CRAG_API_KEY";
pub const ENV_DATA_DIR: &str = "CRAG_DATA_DIR";

const DATABASE_FILE_NAME: &str = "catalog.db";

#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default)]
    pub api_base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Width requested for images; `None` downloads originals
    #[serde(default)]
    pub image_width: Option<u32>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ClientConfig")
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("data_dir", &self.data_dir)
            .field("image_width", &self.image_width)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    /// Read a config file; a missing file yields the default config.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::InvalidInput(format!("Failed to parse config at {}: {error}", path.display()))
        })?;
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply `CRAG_API_URL`, `CRAG_API_KEY` and `CRAG_DATA_DIR` from the
    /// process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup; blank values are ignored.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = normalize_text_option(lookup(ENV_API_URL)) {
            self.api_base_url = url;
        }
        if let Some(key) = normalize_text_option(lookup(ENV_API_KEY)) {
            self.api_key = Some(key);
        }
        if let Some(dir) = normalize_text_option(lookup(ENV_DATA_DIR)) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        self
    }

    /// Trim values and validate the base URL.
    pub fn normalized(mut self) -> Result<Self> {
        self.api_base_url = normalize_base_url(&self.api_base_url)?;
        self.api_key = normalize_text_option(self.api_key);
        if self.image_width == Some(0) {
            return Err(Error::InvalidInput(
                "image_width must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }

    /// Data directory, falling back to `default_dir` when unset.
    pub fn data_dir_or(&self, default_dir: &Path) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| default_dir.to_path_buf())
    }

    pub fn database_path(data_dir: &Path) -> PathBuf {
        data_dir.join(DATABASE_FILE_NAME)
    }

    pub fn api_client(&self) -> Result<ApiClient> {
        ApiClient::new(self.api_base_url.clone(), self.api_key.clone())
    }
}
