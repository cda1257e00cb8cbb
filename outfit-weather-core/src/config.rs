use anyhow::{Context, Result, anyhow};
use chrono::{FixedOffset, Offset, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::provider::ProviderId;

pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 9;

/// Credential and optional endpoint override for one provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Per-call budgets in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub primary_ms: u64,
    pub provider_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { primary_ms: 2_000, provider_ms: 5_000 }
    }
}

impl TimeoutConfig {
    pub fn primary(&self) -> Duration {
        Duration::from_millis(self.primary_ms)
    }

    pub fn provider(&self) -> Duration {
        Duration::from_millis(self.provider_ms)
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
///
/// ```toml
/// utc_offset_hours = 9
///
/// [timeouts]
/// primary_ms = 2000
///
/// [providers.openweather]
/// api_key = "..."
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub providers: HashMap<String, ProviderConfig>,
    pub timeouts: TimeoutConfig,
    pub utc_offset_hours: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            timeouts: TimeoutConfig::default(),
            utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
            cache_path: None,
        }
    }
}

impl Config {
    /// Effective runtime config: the file (or defaults) with environment
    /// credentials applied on top. Never save the result.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_file()?;
        cfg.apply_env();
        Ok(cfg)
    }

    /// Only what is persisted on disk, without environment overrides.
    /// This is the starting point for anything that writes the file back.
    pub fn load_file() -> Result<Self> {
        Self::load_file_from(&Self::config_file_path()?)
    }

    pub fn load_file_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() { Self::load_from(path) } else { Ok(Self::default()) }
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
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

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "outfit-log", "outfit-weather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Historical cache location: `cache_path` if set, else the platform data dir.
    pub fn cache_file_path(&self) -> Result<PathBuf> {
        match &self.cache_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join("weather_cache.json")),
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Non-empty values returned by `lookup` replace configured keys.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for &id in ProviderId::all() {
            let value = lookup(id.env_var()).filter(|v| !v.trim().is_empty());
            if let Some(key) = value {
                self.upsert_provider_api_key(id, key);
            }
        }
    }

    /// Set or replace a provider API key, keeping any base URL override.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers.entry(provider_id.as_str().to_string()).or_default().api_key = api_key;
    }

    pub fn set_provider_base_url(&mut self, provider_id: ProviderId, base_url: String) {
        self.providers.entry(provider_id.as_str().to_string()).or_default().base_url =
            Some(base_url);
    }

    /// Returns the API key for a provider, if present. The station service
    /// shares the forecast service's key unless it has its own.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        let own = self
            .providers
            .get(provider_id.as_str())
            .map(|cfg| cfg.api_key.as_str())
            .filter(|k| !k.is_empty());

        match (own, provider_id) {
            (None, ProviderId::KmaAsos) => self.provider_api_key(ProviderId::Kma),
            (own, _) => own,
        }
    }

    pub fn provider_base_url(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers.get(provider_id.as_str()).and_then(|cfg| cfg.base_url.as_deref())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some()
    }

    /// Local offset used for "today" and hour buckets. Out-of-range values
    /// fall back to KST.
    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .or_else(|| FixedOffset::east_opt(DEFAULT_UTC_OFFSET_HOURS * 3600))
            .unwrap_or_else(|| Utc.fix())
    }
}
