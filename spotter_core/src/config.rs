//! Configuration file support for Spotter.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/spotter/config.toml`.
//! User settings (API keys, training philosophy, coach persona) live in the
//! key-value store instead, so they are saved on every change.

use crate::store::{CacheSlot, KeyValueStore, SETTINGS_KEY};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub hevy: HevyConfig,

    #[serde(default)]
    pub inference: InferenceConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Workout source API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HevyConfig {
    #[serde(default = "default_hevy_base_url")]
    pub base_url: String,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_catalog_pages")]
    pub catalog_pages: u32,

    #[serde(default = "default_catalog_page_size")]
    pub catalog_page_size: u32,
}

impl Default for HevyConfig {
    fn default() -> Self {
        Self {
            base_url: default_hevy_base_url(),
            page_size: default_page_size(),
            catalog_pages: default_catalog_pages(),
            catalog_page_size: default_catalog_page_size(),
        }
    }
}

/// Inference API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_inference_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_analysis_max_tokens")]
    pub analysis_max_tokens: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: default_inference_base_url(),
            model: default_model(),
            analysis_max_tokens: default_analysis_max_tokens(),
        }
    }
}

/// Workout cache configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_freshness_hours")]
    pub freshness_hours: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freshness_hours: default_freshness_hours(),
        }
    }
}

impl CacheConfig {
    /// Freshness window as a duration
    ///
    /// Fails when the hour count does not fit a duration.
    pub fn freshness_window(&self) -> Result<chrono::Duration> {
        chrono::Duration::try_hours(self.freshness_hours).ok_or_else(|| {
            Error::Config(format!(
                "cache.freshness_hours is out of range: {}",
                self.freshness_hours
            ))
        })
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| home_dir().join(".local/share"));
    base.join("spotter")
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_hevy_base_url() -> String {
    "https://api.hevyapp.com/v1".into()
}

fn default_page_size() -> u32 {
    10
}

fn default_catalog_pages() -> u32 {
    3
}

fn default_catalog_page_size() -> u32 {
    100
}

fn default_inference_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_analysis_max_tokens() -> u32 {
    1000
}

fn default_freshness_hours() -> i64 {
    24
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| home_dir().join(".config"));
        base.join("spotter").join("config.toml")
    }

    /// Reject values that would make syncing loop or never fetch
    pub fn validate(&self) -> Result<()> {
        if self.hevy.page_size == 0 {
            return Err(Error::Config("hevy.page_size must be at least 1".into()));
        }
        if self.hevy.catalog_page_size == 0 {
            return Err(Error::Config(
                "hevy.catalog_page_size must be at least 1".into(),
            ));
        }
        if self.cache.freshness_hours < 0 {
            return Err(Error::Config("cache.freshness_hours cannot be negative".into()));
        }
        self.cache.freshness_window()?;
        Ok(())
    }
}

/// Persisted user settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub hevy_api_key: Option<String>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub training_philosophy: Option<String>,
    #[serde(default = "default_coach_id")]
    pub selected_coach_id: String,
}

fn default_coach_id() -> String {
    crate::prompts::DEFAULT_COACH_ID.into()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hevy_api_key: None,
            openai_api_key: None,
            training_philosophy: None,
            selected_coach_id: default_coach_id(),
        }
    }
}

impl Settings {
    /// Non-empty workout source credential
    pub fn hevy_key(&self) -> Option<&str> {
        non_empty(self.hevy_api_key.as_deref())
    }

    /// Non-empty inference credential
    pub fn openai_key(&self) -> Option<&str> {
        non_empty(self.openai_api_key.as_deref())
    }

    /// Non-empty training philosophy text
    pub fn philosophy(&self) -> Option<&str> {
        non_empty(self.training_philosophy.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Settings bound to their store slot: loaded once, saved on every change
pub struct SettingsStore {
    slot: CacheSlot<Settings>,
    current: Settings,
}

impl SettingsStore {
    /// Load settings from the store, falling back to defaults
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let slot = CacheSlot::new(store, SETTINGS_KEY);
        let current = slot.read().unwrap_or_default();
        Self { slot, current }
    }

    pub fn get(&self) -> &Settings {
        &self.current
    }

    /// Apply a change and persist it
    pub fn update<F>(&mut self, f: F) -> Result<&Settings>
    where
        F: FnOnce(&mut Settings),
    {
        let mut next = self.current.clone();
        f(&mut next);
        self.slot.write(&next)?;
        self.current = next;
        tracing::debug!("Saved settings");
        Ok(&self.current)
    }
}
