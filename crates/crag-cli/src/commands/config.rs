use std::path::{Path, PathBuf};

use crag_core::ClientConfig;
use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::commands::common::CliContext;
use crate::config_profiles::{default_config_path, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(
    command: ConfigCommands,
    global_profile: Option<&str>,
    data_dir: Option<&Path>,
) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            api_url,
            api_key,
            data_dir: profile_data_dir,
            image_width,
            no_activate,
        } => {
            let mut config = CliProfilesConfig::load()?;
            let profile_name = apply_init(
                &mut config,
                global_profile,
                &api_url,
                api_key,
                profile_data_dir,
                image_width,
                no_activate,
            )?;
            let path = config.save()?;
            println!("Saved profile '{profile_name}' to {}", path.display());
            Ok(())
        }
        ConfigCommands::Show { json } => {
            let ctx = CliContext::resolve(global_profile, data_dir)?;
            let view = ConfigView::from_context(&ctx);
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                for line in view.lines() {
                    println!("{line}");
                }
            }
            Ok(())
        }
    }
}

/// Validate and store `config init` values into the selected profile.
/// Returns the profile name.
#[allow(clippy::too_many_arguments)]
pub fn apply_init(
    config: &mut CliProfilesConfig,
    profile_name: Option<&str>,
    api_url: &str,
    api_key: Option<String>,
    data_dir: Option<PathBuf>,
    image_width: Option<u32>,
    no_activate: bool,
) -> Result<String, CliError> {
    let validated = ClientConfig {
        image_width,
        ..ClientConfig::new(api_url)
    }
    .normalized()
    .map_err(|error| CliError::Config(error.to_string()))?;

    let profile_name = config.resolve_profile_name(profile_name);
    let profile = config.profile_mut_or_default(&profile_name);
    profile.api_base_url = Some(validated.api_base_url);
    if let Some(api_key) = api_key {
        profile.api_key = Some(api_key);
    }
    if let Some(data_dir) = data_dir {
        profile.data_dir = Some(data_dir);
    }
    if image_width.is_some() {
        profile.image_width = image_width;
    }

    if !no_activate || config.active_profile.is_none() {
        config.active_profile = Some(profile_name.clone());
    }
    Ok(profile_name)
}

#[derive(Debug, Serialize)]
pub struct ConfigView {
    pub profile: String,
    pub config_path: PathBuf,
    pub api_base_url: Option<String>,
    pub api_key_configured: bool,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub image_width: Option<u32>,
}

impl ConfigView {
    pub fn from_context(ctx: &CliContext) -> Self {
        let api_base_url = ctx.config.api_base_url.trim();
        Self {
            profile: ctx.profile.clone(),
            config_path: default_config_path(),
            api_base_url: (!api_base_url.is_empty()).then(|| api_base_url.to_string()),
            api_key_configured: ctx.config.api_key.is_some(),
            data_dir: ctx.data_dir.clone(),
            database_path: ctx.database_path(),
            image_width: ctx.config.image_width,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("profile:      {}", self.profile),
            format!("config file:  {}", self.config_path.display()),
            format!(
                "api url:      {}",
                self.api_base_url.as_deref().unwrap_or("(not set)")
            ),
            format!(
                "api key:      {}",
                if self.api_key_configured {
                    "configured"
                } else {
                    "(not set, edits stay local)"
                }
            ),
            format!("data dir:     {}", self.data_dir.display()),
            format!("database:     {}", self.database_path.display()),
            format!(
                "image width:  {}",
                self.image_width
                    .map_or_else(|| "original".to_string(), |width| format!("{width}px"))
            ),
        ]
    }
}
