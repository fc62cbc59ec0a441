use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::{controller::ControllerSettings, sync::SyncSettings};

pub const DEFAULT_BASE_URL: &str = "https://api.weatherapi.com/";

/// Longest forecast the weatherapi.com forecast endpoint serves.
pub const MAX_FORECAST_DAYS: u8 = 14;

/// Environment variable that takes precedence over the stored API key.
pub const API_KEY_ENV: &str = "WEATHER_API_KEY";

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// forecast_days = 3
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// weatherapi.com credential.
    pub api_key: Option<String>,
    pub base_url: String,
    pub forecast_days: u8,
    pub request_timeout_secs: u64,
    /// Snapshots older than this are purged.
    pub cache_retention_secs: u64,
    /// Minimum gap between fetches triggered by location updates.
    pub min_update_interval_secs: u64,
    pub location_timeout_secs: u64,
    /// Overrides the platform data directory location of the cache database.
    pub database_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            forecast_days: 5,
            request_timeout_secs: 10,
            cache_retention_secs: 60 * 60,
            min_update_interval_secs: 5 * 60,
            location_timeout_secs: 15,
            database_path: None,
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    /// `WEATHER_API_KEY` overrides the stored key.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        let mut cfg = Self::load_from(&path)?;

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                cfg.api_key = Some(key.trim().to_string());
            }
        }

        Ok(cfg)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Cache database location: the configured override or the platform data dir.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join("weather.db")),
        }
    }

    /// Returns the API key, or an error telling the user how to set one.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty()).ok_or_else(|| {
            anyhow!(
                "No API key configured.\n\
                 Hint: run `weather configure` and enter your weatherapi.com key, \
                 or set {API_KEY_ENV}."
            )
        })
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            forecast_days: self.forecast_days,
            retention: Duration::from_secs(self.cache_retention_secs),
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            min_update_interval: Duration::from_secs(self.min_update_interval_secs),
            location_timeout: Duration::from_secs(self.location_timeout_secs),
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "weather-task", "weather-cli")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}
