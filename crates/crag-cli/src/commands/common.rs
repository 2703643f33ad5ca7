use std::path::{Path, PathBuf};

use chrono::Utc;
use crag_core::models::{Area, Blocking, BlockingType, Path as ClimbingPath, Sector, Zone};
use crag_core::{ApiClient, CatalogService, ClientConfig, Entity, FileCache, FileManager, FileId};
use serde::Serialize;

use crate::config_profiles::{default_data_dir, CliProfile, CliProfilesConfig};
use crate::error::CliError;

/// Configuration resolved from the active profile, `CRAG_*` variables and
/// command-line flags, in increasing priority.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub profile: String,
    pub config: ClientConfig,
    pub data_dir: PathBuf,
}

impl CliContext {
    pub fn resolve(profile: Option<&str>, data_dir: Option<&Path>) -> Result<Self, CliError> {
        let profiles = CliProfilesConfig::load()?;
        Ok(Self::from_profiles(&profiles, profile, data_dir))
    }

    pub fn from_profiles(
        profiles: &CliProfilesConfig,
        profile: Option<&str>,
        data_dir: Option<&Path>,
    ) -> Self {
        let profile = profiles.resolve_profile_name(profile);
        let mut config = profiles
            .profile(&profile)
            .map(CliProfile::to_client_config)
            .unwrap_or_default()
            .with_env_overrides();
        if let Some(data_dir) = data_dir {
            config.data_dir = Some(data_dir.to_path_buf());
        }
        let data_dir = config.data_dir_or(&default_data_dir());
        Self {
            profile,
            config,
            data_dir,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        ClientConfig::database_path(&self.data_dir)
    }

    pub async fn open_catalog(&self) -> Result<CatalogService, CliError> {
        Ok(CatalogService::open_path(self.database_path()).await?)
    }

    /// Validated config for commands that talk to the server.
    pub fn remote_config(&self) -> Result<ClientConfig, CliError> {
        if self.config.api_base_url.trim().is_empty() {
            return Err(CliError::ServerNotConfigured);
        }
        Ok(self.config.clone().normalized()?)
    }

    pub fn api_client(&self) -> Result<ApiClient, CliError> {
        Ok(self.remote_config()?.api_client()?)
    }

    pub async fn open_files(&self) -> Result<FileManager, CliError> {
        let cache = FileCache::open_in(&self.data_dir).await?;
        Ok(FileManager::new(cache, self.api_client()?))
    }

    /// Explicit width, else the configured default.
    pub const fn image_width(&self, explicit: Option<u32>) -> Option<u32> {
        match explicit {
            Some(width) => Some(width),
            None => self.config.image_width,
        }
    }
}

pub fn parse_file_id(value: &str) -> Result<FileId, CliError> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::InvalidFileId(value.trim().to_string()))
}

/// One-line human description of a record.
pub trait Describe {
    fn describe(&self) -> String;
}

impl Describe for Area {
    fn describe(&self) -> String {
        self.display_name.clone()
    }
}

impl Describe for Zone {
    fn describe(&self) -> String {
        format!(
            "{} ({:.4}, {:.4})",
            self.display_name, self.latitude, self.longitude
        )
    }
}

impl Describe for Sector {
    fn describe(&self) -> String {
        if self.kids_apt {
            format!("{} [kids]", self.display_name)
        } else {
            self.display_name.clone()
        }
    }
}

impl Describe for ClimbingPath {
    fn describe(&self) -> String {
        let mut line = format!("{}. {} {}", self.sketch_id, self.display_name, self.grade);
        if self.pitches.len() > 1 {
            line.push_str(&format!(" ({} pitches)", self.pitches.len()));
        }
        if self.requires_gear() {
            line.push_str(" [gear]");
        }
        line
    }
}

impl Describe for Blocking {
    fn describe(&self) -> String {
        let status = if self.is_active(Utc::now()) {
            "active"
        } else {
            "inactive"
        };
        format!(
            "path {}: {} ({status})",
            self.path_id,
            blocking_type_label(self.block_type)
        )
    }
}

const fn blocking_type_label(block_type: BlockingType) -> &'static str {
    match block_type {
        BlockingType::Bird => "bird nesting",
        BlockingType::Build => "re-equipping",
        BlockingType::Old => "worn hardware",
        BlockingType::Plants => "protected plants",
        BlockingType::Dangerous => "dangerous",
        BlockingType::Unknown => "restricted",
    }
}

#[derive(Debug, Serialize)]
pub struct EntityListItem<'a, E> {
    pub kind: &'static str,
    pub summary: String,
    #[serde(flatten)]
    pub entity: &'a E,
}

pub fn entity_to_list_item<E: Entity + Describe>(entity: &E) -> EntityListItem<'_, E> {
    EntityListItem {
        kind: E::KIND.as_str(),
        summary: entity.describe(),
        entity,
    }
}

pub fn format_entity_lines<E: Entity + Describe>(entities: &[E]) -> Vec<String> {
    if entities.is_empty() {
        return vec![format!("No {} records.", E::KIND)];
    }
    entities
        .iter()
        .map(|entity| format!("{:>8}  {}", entity.id(), entity.describe()))
        .collect()
}
