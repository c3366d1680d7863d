// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error, path::PathBuf, str::FromStr};

use tokio::fs;

use saber_core::{APP_NAME, InstanceConfig, RawConfig};

const SABER_CONFIG_ENV: &str = "SABER_CONFIG";
const SETTINGS_FILE: &str = "settings.toml";

/// Loads and validates the settings file.
///
/// The file is the one given on the command line, else `$SABER_CONFIG`, else
/// `saber/settings.toml` in the user's config directory.
#[tracing::instrument]
pub async fn parse_config(path: Option<PathBuf>) -> Result<Settings, Box<dyn Error>> {
    let path = if let Some(path) = path {
        path
    } else if let Ok(env_path) = std::env::var(SABER_CONFIG_ENV) {
        PathBuf::from(env_path)
    } else {
        let config = get_config_dir()?.join(APP_NAME).join(SETTINGS_FILE);
        if !config.exists() {
            return Err(format!(
                "No settings found at: {}, run `{APP_NAME} example-settings` for a template",
                config.display()
            )
            .into());
        }
        config
    };

    let raw = fs::read_to_string(&path)
        .await
        .map_err(|e| format!("Failed to read settings file at {}: {}", path.display(), e))?
        .parse::<SettingsRaw>()
        .map_err(|e| format!("Failed to parse settings file at {}: {}", path.display(), e))?;

    let instances = raw.0.resolve(path.parent())?;
    tracing::debug!(count = instances.len(), "settings loaded");
    Ok(Settings { path, instances })
}

/// The validated settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Where the settings were read from.
    pub path: PathBuf,

    /// The instances under test, in file order.
    pub instances: Vec<InstanceConfig>,
}

impl Settings {
    /// Keeps only the named instances, all of them if `names` is empty.
    pub fn select(self, names: &[String]) -> Result<Vec<InstanceConfig>, Box<dyn Error>> {
        if names.is_empty() {
            return Ok(self.instances);
        }

        let unknown: Vec<_> = names
            .iter()
            .filter(|name| !self.instances.iter().any(|i| &i.name == *name))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(format!("unknown instance: {}", unknown.join(", ")).into());
        }

        Ok(self
            .instances
            .into_iter()
            .filter(|i| names.contains(&i.name))
            .collect())
    }
}

#[derive(Debug)]
struct SettingsRaw(RawConfig);

impl FromStr for SettingsRaw {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(toml::from_str(s)?))
    }
}

fn get_config_dir() -> Result<PathBuf, Box<dyn Error>> {
    #[cfg(unix)]
    let config_dir = xdg::BaseDirectories::new().get_config_home();
    #[cfg(windows)]
    let config_dir = dirs::config_dir();
    config_dir.ok_or_else(|| "User-specific home directory not found".into())
}
