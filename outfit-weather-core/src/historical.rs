//! "What was the weather on date D in region X."
//!
//! Resolution order: cache, the [`ProviderId::HISTORICAL_CHAIN`], an estimate
//! derived from the primary provider's short-term forecast, and finally a
//! placeholder from [`crate::defaults`]. Placeholders are never cached, and a
//! cached placeholder is dropped and recomputed.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    aggregate::{max, mean, min, most_frequent, round1},
    cache::WeatherCache,
    defaults::{default_record, is_placeholder, record_is_placeholder},
    engine::EngineSettings,
    error::WeatherError,
    model::{
        CachedHistoricalEntry, Observation, PrecipitationType, Sky, WeatherRecord, WeatherSource,
        cache_key,
    },
    provider::{
        ProviderId, ProviderRegistry,
        kma::{
            ForecastItem, PCP, PTY, REH, SKY, TMP, parse_number, parse_precipitation,
            pty_from_code, sky_from_code,
        },
        with_budget,
    },
    region::{Region, RegionDirectory},
    season::season_for_date,
};

fn values_of<'a>(rows: &[&'a ForecastItem], category: &str) -> Vec<&'a str> {
    rows.iter()
        .filter(|i| i.category == category)
        .map(|i| i.value.as_str())
        .collect()
}

/// Summarize the forecast rows that fall on `date`.
///
/// Returns `None` when no temperature row matches the date.
pub fn derive_from_forecast(items: &[ForecastItem], date: NaiveDate) -> Option<Observation> {
    let rows: Vec<&ForecastItem> = items.iter().filter(|i| i.date == date).collect();
    let values = |category: &str| values_of(&rows, category);

    let temps: Vec<f64> = values(TMP).into_iter().filter_map(parse_number).collect();
    let rain: Vec<f64> =
        values(PCP).into_iter().map(|v| parse_precipitation(v).max(0.0)).collect();
    let humidity: Vec<f64> = values(REH).into_iter().filter_map(parse_number).collect();

    Some(Observation {
        temperature: round1(mean(&temps)?),
        min_temperature: min(&temps),
        max_temperature: max(&temps),
        rain: max(&rain).unwrap_or(0.0),
        humidity: mean(&humidity).map(round1),
        sky: most_frequent(values(SKY)).map(sky_from_code).unwrap_or(Sky::PartlyCloudy),
        precipitation_type: most_frequent(values(PTY))
            .map(pty_from_code)
            .unwrap_or(PrecipitationType::None),
    })
}

#[derive(Debug)]
pub struct HistoricalWeatherOrchestrator {
    registry: ProviderRegistry,
    regions: RegionDirectory,
    cache: Arc<dyn WeatherCache>,
    settings: EngineSettings,
}

impl HistoricalWeatherOrchestrator {
    pub fn new(
        registry: ProviderRegistry,
        cache: Arc<dyn WeatherCache>,
        settings: EngineSettings,
    ) -> Self {
        Self { registry, regions: RegionDirectory::new(), cache, settings }
    }

    pub async fn get_or_fetch(&self, date: NaiveDate, region_id: &str) -> WeatherRecord {
        let region = match self.regions.resolve(region_id) {
            Ok(region) => region,
            Err(e) => {
                warn!(region = region_id, %date, error = %e, "unknown region, answering with default weather");
                return default_record(date);
            }
        };
        let key = cache_key(date, region.id);

        if let Some(record) = self.cached(&key).await {
            return record;
        }

        let season = season_for_date(date);

        if let Some((id, observation)) = self.from_chain(date, region).await {
            let record = WeatherRecord::build(observation, season.label, id.source());
            self.store(&key, date, region, &record).await;
            return record;
        }

        if let Some(observation) = self.from_forecast(date, region).await {
            let record = WeatherRecord::build(observation, season.label, WeatherSource::Derived);
            self.store(&key, date, region, &record).await;
            return record;
        }

        info!(region = region.id, %date, "no weather data for date, using default");
        default_record(date)
    }

    /// A usable cache hit. Placeholder entries are deleted here.
    async fn cached(&self, key: &str) -> Option<WeatherRecord> {
        let entry = match self.cache.get(key).await {
            Ok(entry) => entry?,
            Err(e) => {
                warn!(key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        if !is_placeholder(&entry) {
            debug!(key, resolved_by = %entry.resolved_by, "historical cache hit");
            return Some(entry.to_record());
        }

        info!(key, "cached entry is a placeholder, recomputing");
        if let Err(e) = self.cache.delete(key).await {
            warn!(key, error = %e, "failed to delete placeholder cache entry");
        }
        None
    }

    async fn from_chain(
        &self,
        date: NaiveDate,
        region: &Region,
    ) -> Option<(ProviderId, Observation)> {
        for id in ProviderId::HISTORICAL_CHAIN {
            match self.attempt(id, date, region).await {
                Ok(Some(observation)) => return Some((id, observation)),
                Ok(None) => debug!(provider = %id, region = region.id, %date, "no data for date"),
                Err(e) => {
                    warn!(provider = %id, region = region.id, %date, kind = e.kind(), error = %e, "historical weather source failed");
                }
            }
        }
        None
    }

    async fn attempt(
        &self,
        id: ProviderId,
        date: NaiveDate,
        region: &Region,
    ) -> Result<Option<Observation>, WeatherError> {
        let Some(provider) = self.registry.get(id) else {
            return Ok(None);
        };

        let payload =
            with_budget(id, self.settings.provider_timeout, provider.fetch_historical(date, region))
                .await?;
        payload.map(|p| p.normalize()).transpose()
    }

    async fn from_forecast(&self, date: NaiveDate, region: &Region) -> Option<Observation> {
        let feed = self.registry.forecast_feed()?;

        let items = match with_budget(
            ProviderId::Kma,
            self.settings.provider_timeout,
            feed.fetch_forecast_items(region),
        )
        .await
        {
            Ok(items) => items,
            Err(e) => {
                warn!(provider = %ProviderId::Kma, region = region.id, %date, kind = e.kind(), error = %e, "forecast feed failed");
                return None;
            }
        };

        let derived = derive_from_forecast(&items, date);
        if derived.is_none() {
            debug!(region = region.id, %date, rows = items.len(), "no forecast rows for date");
        }
        derived
    }

    async fn store(&self, key: &str, date: NaiveDate, region: &Region, record: &WeatherRecord) {
        if record_is_placeholder(record) {
            debug!(key, "not caching placeholder-valued record");
            return;
        }

        let entry = CachedHistoricalEntry::from_record(date, region.id, record);
        if let Err(e) = self.cache.put(key, &entry).await {
            warn!(key, error = %e, "failed to write historical cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn rows() -> Vec<ForecastItem> {
        vec![
            ForecastItem::new(TMP, day(20), "0600", "11"),
            ForecastItem::new(TMP, day(20), "1200", "19"),
            ForecastItem::new(TMP, day(20), "1800", "15"),
            ForecastItem::new(PCP, day(20), "0600", "강수없음"),
            ForecastItem::new(PCP, day(20), "1200", "1.0mm 미만"),
            ForecastItem::new(PCP, day(20), "1800", "3.0mm"),
            ForecastItem::new(REH, day(20), "0600", "80"),
            ForecastItem::new(REH, day(20), "1200", "55"),
            ForecastItem::new(SKY, day(20), "0600", "4"),
            ForecastItem::new(SKY, day(20), "1200", "1"),
            ForecastItem::new(SKY, day(20), "1800", "4"),
            ForecastItem::new(PTY, day(20), "0600", "0"),
            ForecastItem::new(PTY, day(20), "1200", "0"),
            ForecastItem::new(PTY, day(20), "1800", "1"),
            ForecastItem::new(TMP, day(21), "0600", "30"),
        ]
    }

    #[test]
    fn derives_daily_summary_for_matching_date() {
        let obs = derive_from_forecast(&rows(), day(20)).unwrap();

        assert_eq!(obs.temperature, 15.0);
        assert_eq!(obs.min_temperature, Some(11.0));
        assert_eq!(obs.max_temperature, Some(19.0));
        assert_eq!(obs.rain, 3.0);
        assert_eq!(obs.humidity, Some(67.5));
        assert_eq!(obs.sky, Sky::Overcast);
        assert_eq!(obs.precipitation_type, PrecipitationType::None);
    }

    #[test]
    fn sky_tie_goes_to_first_seen_code() {
        let items = vec![
            ForecastItem::new(TMP, day(20), "0900", "10"),
            ForecastItem::new(SKY, day(20), "0900", "3"),
            ForecastItem::new(SKY, day(20), "1200", "1"),
        ];
        let obs = derive_from_forecast(&items, day(20)).unwrap();
        assert_eq!(obs.sky, Sky::PartlyCloudy);
    }

    #[test]
    fn no_rows_for_date_derives_nothing() {
        assert!(derive_from_forecast(&rows(), day(25)).is_none());
        assert!(derive_from_forecast(&[], day(20)).is_none());
    }
}
