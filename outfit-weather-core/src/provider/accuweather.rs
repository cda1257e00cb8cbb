//! Current conditions from an AccuWeather-style API.
//!
//! Requests are keyed by a location key, which costs one extra lookup per
//! region; keys are remembered for the life of the adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::{
    error::WeatherError,
    model::{Observation, PrecipitationType, Sky},
    provider::{
        ProviderId, ProviderSettings, RawPayload, WeatherProvider,
        http::{get_body, parse_json},
    },
    region::Region,
};

#[derive(Debug)]
pub struct AccuWeatherProvider {
    settings: ProviderSettings,
    location_keys: Mutex<HashMap<&'static str, String>>,
}

#[derive(Debug, Deserialize)]
struct AwLocation {
    #[serde(rename = "Key")]
    key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AwMetric {
    #[serde(rename = "Value")]
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AwMeasure {
    #[serde(rename = "Metric")]
    pub metric: AwMetric,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AwCurrent {
    #[serde(rename = "WeatherIcon")]
    pub weather_icon: u8,
    #[serde(rename = "Temperature")]
    pub temperature: AwMeasure,
    #[serde(rename = "RelativeHumidity", default)]
    pub relative_humidity: Option<f64>,
    #[serde(rename = "Precip1hr", default)]
    pub precip_1hr: Option<AwMeasure>,
}

/// Icon number (1–44) to `(sky, precipitation)`.
pub fn classify_icon(icon: u8) -> (Sky, PrecipitationType) {
    match icon {
        1 | 2 | 30..=34 => (Sky::Clear, PrecipitationType::None),
        3..=5 | 35..=38 => (Sky::PartlyCloudy, PrecipitationType::None),
        6..=8 | 11 => (Sky::Overcast, PrecipitationType::None),
        12..=17 | 39..=42 => (Sky::Overcast, PrecipitationType::Shower),
        18 => (Sky::Overcast, PrecipitationType::Rain),
        19..=23 | 43 | 44 => (Sky::Overcast, PrecipitationType::Snow),
        24..=26 | 29 => (Sky::Overcast, PrecipitationType::RainSnow),
        other => {
            tracing::debug!(icon = other, "unmapped weather icon");
            (Sky::PartlyCloudy, PrecipitationType::None)
        }
    }
}

pub fn normalize(current: &AwCurrent) -> Observation {
    let (sky, precipitation_type) = classify_icon(current.weather_icon);
    Observation {
        temperature: current.temperature.metric.value,
        min_temperature: None,
        max_temperature: None,
        rain: current.precip_1hr.as_ref().map(|p| p.metric.value).unwrap_or(0.0),
        humidity: current.relative_humidity,
        sky,
        precipitation_type,
    }
}

impl AccuWeatherProvider {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings, location_keys: Mutex::new(HashMap::new()) }
    }

    async fn location_key(&self, region: &Region, api_key: &str) -> Result<String, WeatherError> {
        let cached = self.location_keys.lock().get(region.id).cloned();
        if let Some(key) = cached {
            return Ok(key);
        }

        let city = region.english_name.split(',').next().unwrap_or(region.english_name);
        let url = format!("{}/locations/v1/cities/search", self.settings.base_url);
        let body = get_body(
            &self.settings.http,
            self.id(),
            &url,
            &[("apikey", api_key), ("q", city)],
        )
        .await?;

        let locations: Vec<AwLocation> = parse_json(self.id(), &body)?;
        let key = locations
            .into_iter()
            .next()
            .map(|l| l.key)
            .ok_or_else(|| WeatherError::format(self.id(), format!("no location for '{city}'")))?;

        self.location_keys.lock().insert(region.id, key.clone());
        Ok(key)
    }
}

#[async_trait]
impl WeatherProvider for AccuWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::AccuWeather
    }

    async fn fetch_current(&self, region: &Region) -> Result<RawPayload, WeatherError> {
        let api_key = self.settings.require_key(self.id())?;
        let location = self.location_key(region, api_key).await?;

        let url = format!("{}/currentconditions/v1/{location}", self.settings.base_url);
        let body = get_body(
            &self.settings.http,
            self.id(),
            &url,
            &[("apikey", api_key), ("details", "true")],
        )
        .await?;

        let conditions: Vec<AwCurrent> = parse_json(self.id(), &body)?;
        conditions
            .into_iter()
            .next()
            .map(RawPayload::AccuWeatherCurrent)
            .ok_or_else(|| WeatherError::format(self.id(), "empty current conditions"))
    }

    /// Current conditions only.
    async fn fetch_historical(
        &self,
        _date: NaiveDate,
        _region: &Region,
    ) -> Result<Option<RawPayload>, WeatherError> {
        Ok(None)
    }
}
