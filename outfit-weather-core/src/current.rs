//! "What is the weather right now in region X."
//!
//! The primary forecast gets the short primary budget, then the fallbacks are
//! tried one at a time in [`ProviderId::CURRENT_FALLBACKS`] order. When all of
//! them fail the answer is a mock reading, so [`get_weather`] has no error
//! return.
//!
//! [`get_weather`]: CurrentWeatherOrchestrator::get_weather

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use parking_lot::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    engine::EngineSettings,
    error::WeatherError,
    model::{Observation, PrecipitationType, Sky, WeatherRecord, WeatherSource},
    provider::{ProviderId, ProviderRegistry, with_budget},
    region::{Region, RegionDirectory},
    season::season_for_date,
};

pub const PRIMARY: ProviderId = ProviderId::Kma;

#[derive(Debug)]
pub struct CurrentWeatherOrchestrator {
    registry: ProviderRegistry,
    regions: RegionDirectory,
    settings: EngineSettings,
    /// Diagnostics only; every call starts again from the primary.
    last_source: Mutex<Option<WeatherSource>>,
}

/// Mock temperature for a local hour of day.
pub fn mock_temperature(hour: u32) -> f64 {
    match hour {
        6..=11 => 18.0,
        12..=17 => 25.0,
        18..=21 => 22.0,
        _ => 15.0,
    }
}

pub fn mock_observation(hour: u32) -> Observation {
    Observation {
        temperature: mock_temperature(hour),
        min_temperature: None,
        max_temperature: None,
        rain: 0.0,
        humidity: Some(65.0),
        sky: Sky::Clear,
        precipitation_type: PrecipitationType::None,
    }
}

impl CurrentWeatherOrchestrator {
    pub fn new(registry: ProviderRegistry, settings: EngineSettings) -> Self {
        Self {
            registry,
            regions: RegionDirectory::new(),
            settings,
            last_source: Mutex::new(None),
        }
    }

    /// Source tag of the most recent answer.
    pub fn last_source(&self) -> Option<WeatherSource> {
        *self.last_source.lock()
    }

    pub async fn get_weather(&self, region_id: &str) -> WeatherRecord {
        let now = Utc::now().with_timezone(&self.settings.utc_offset);

        let region = match self.regions.resolve(region_id) {
            Ok(region) => region,
            Err(e) => {
                let capital = self.regions.capital();
                warn!(region = region_id, fallback = capital.id, error = %e, "unknown region, answering with mock weather");
                return self.finish(self.mock_record(now), capital);
            }
        };

        let record = match self.resolve(region, now).await {
            Ok(record) => record,
            Err(e) => {
                warn!(region = region.id, kind = e.kind(), "{e}, using mock reading");
                self.mock_record(now)
            }
        };
        self.finish(record, region)
    }

    async fn resolve(
        &self,
        region: &Region,
        now: DateTime<FixedOffset>,
    ) -> Result<WeatherRecord, WeatherError> {
        let season = season_for_date(now.date_naive());
        let attempts = std::iter::once((PRIMARY, self.settings.primary_timeout)).chain(
            ProviderId::CURRENT_FALLBACKS
                .iter()
                .map(|&id| (id, self.settings.provider_timeout)),
        );

        for (id, budget) in attempts {
            match self.attempt(id, region, budget).await {
                Ok(observation) => {
                    return Ok(WeatherRecord::build(observation, season.label, id.source()));
                }
                Err(e) => {
                    warn!(provider = %id, region = region.id, kind = e.kind(), error = %e, "current weather source failed");
                }
            }
        }
        Err(WeatherError::AllProvidersExhausted)
    }

    async fn attempt(
        &self,
        id: ProviderId,
        region: &Region,
        budget: Duration,
    ) -> Result<Observation, WeatherError> {
        let provider = self
            .registry
            .get(id)
            .ok_or_else(|| WeatherError::unavailable(id, "not registered"))?;

        let payload = with_budget(id, budget, provider.fetch_current(region)).await?;
        payload.normalize()
    }

    fn mock_record(&self, now: DateTime<FixedOffset>) -> WeatherRecord {
        let season = season_for_date(now.date_naive());
        WeatherRecord::build(mock_observation(now.hour()), season.label, WeatherSource::Mock)
    }

    fn finish(&self, record: WeatherRecord, region: &Region) -> WeatherRecord {
        let previous = self.last_source.lock().replace(record.source);
        if previous.is_some_and(|p| p != record.source) {
            info!(region = region.id, source = %record.source, "current weather source changed");
        } else {
            debug!(region = region.id, source = %record.source, "current weather resolved");
        }
        record
    }
}
