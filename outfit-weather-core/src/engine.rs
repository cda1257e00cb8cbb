use anyhow::Result;
use chrono::{FixedOffset, NaiveDate};
use std::{sync::Arc, time::Duration};
use tracing::warn;

use crate::{
    cache::{FileCache, WeatherCache},
    config::{Config, TimeoutConfig},
    current::CurrentWeatherOrchestrator,
    defaults::generic_default_record,
    error::WeatherError,
    historical::HistoricalWeatherOrchestrator,
    model::WeatherRecord,
    provider::ProviderRegistry,
};

/// Budgets and clock shared by both orchestrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub primary_timeout: Duration,
    pub provider_timeout: Duration,
    pub utc_offset: FixedOffset,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let timeouts = TimeoutConfig::default();
        Self {
            primary_timeout: timeouts.primary(),
            provider_timeout: timeouts.provider(),
            utc_offset: Config::default().utc_offset(),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            primary_timeout: config.timeouts.primary(),
            provider_timeout: config.timeouts.provider(),
            utc_offset: config.utc_offset(),
        }
    }
}

/// Entry point for callers: one object answering both current and
/// historical questions. Neither method fails.
#[derive(Debug)]
pub struct WeatherEngine {
    current: CurrentWeatherOrchestrator,
    historical: HistoricalWeatherOrchestrator,
}

impl WeatherEngine {
    pub fn new(
        registry: ProviderRegistry,
        cache: Arc<dyn WeatherCache>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            current: CurrentWeatherOrchestrator::new(registry.clone(), settings),
            historical: HistoricalWeatherOrchestrator::new(registry, cache, settings),
        }
    }

    /// Every adapter from config, with the on-disk cache.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = FileCache::new(config.cache_file_path()?);
        Ok(Self::new(
            ProviderRegistry::from_config(config),
            Arc::new(cache),
            EngineSettings::from_config(config),
        ))
    }

    pub async fn current_weather(&self, region_id: &str) -> WeatherRecord {
        self.current.get_weather(region_id).await
    }

    /// `date` is `YYYY-MM-DD`; anything else yields the generic default.
    pub async fn historical_weather(&self, date: &str, region_id: &str) -> WeatherRecord {
        match parse_date(date) {
            Ok(date) => self.historical.get_or_fetch(date, region_id).await,
            Err(e) => {
                warn!(region = region_id, error = %e, "rejecting historical lookup");
                generic_default_record()
            }
        }
    }

    pub fn current(&self) -> &CurrentWeatherOrchestrator {
        &self.current
    }

    pub fn historical(&self) -> &HistoricalWeatherOrchestrator {
        &self.historical
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, WeatherError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| WeatherError::InvalidDate(raw.to_string()))
}
