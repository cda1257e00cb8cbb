//! Timeline API: one endpoint for current conditions and any single day.
//! Conditions come as free text, e.g. "Rain, Partially cloudy".

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    aggregate::{max, most_frequent},
    error::WeatherError,
    model::{Observation, PrecipitationType, Sky},
    provider::{
        ProviderId, ProviderSettings, RawPayload, WeatherProvider,
        http::{get_body, parse_json},
    },
    region::Region,
};

/// Tried in order, first substring match wins.
const CONDITION_TABLE: &[(&[&str], Sky, PrecipitationType)] = &[
    (&["clear", "sunny"], Sky::Clear, PrecipitationType::None),
    (&["partly cloudy", "mostly clear"], Sky::PartlyCloudy, PrecipitationType::None),
    (&["cloudy", "overcast"], Sky::Overcast, PrecipitationType::None),
    (&["rain", "drizzle", "shower"], Sky::Overcast, PrecipitationType::Rain),
    (&["snow"], Sky::Overcast, PrecipitationType::Snow),
    (&["fog", "mist"], Sky::Overcast, PrecipitationType::None),
];

pub fn classify_conditions(text: &str) -> (Sky, PrecipitationType) {
    let lower = text.to_lowercase();
    CONDITION_TABLE
        .iter()
        .find(|(needles, _, _)| needles.iter().any(|n| lower.contains(n)))
        .map(|&(_, sky, pty)| (sky, pty))
        .unwrap_or_else(|| {
            tracing::debug!(conditions = text, "unmatched condition text");
            (Sky::PartlyCloudy, PrecipitationType::None)
        })
}

#[derive(Debug, Clone, Deserialize)]
pub struct VcConditions {
    pub temp: f64,
    pub humidity: Option<f64>,
    #[serde(default)]
    pub precip: Option<f64>,
    #[serde(default)]
    pub conditions: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VcDay {
    pub temp: f64,
    pub tempmin: Option<f64>,
    pub tempmax: Option<f64>,
    pub humidity: Option<f64>,
    #[serde(default)]
    pub precip: Option<f64>,
    #[serde(default)]
    pub conditions: String,
    #[serde(default)]
    pub hours: Vec<VcConditions>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VcTimeline {
    #[serde(default)]
    current_conditions: Option<VcConditions>,
    #[serde(default)]
    days: Vec<VcDay>,
}

pub fn normalize_current(current: &VcConditions) -> Observation {
    let (sky, precipitation_type) = classify_conditions(&current.conditions);
    Observation {
        temperature: current.temp,
        min_temperature: None,
        max_temperature: None,
        rain: current.precip.unwrap_or(0.0),
        humidity: current.humidity,
        sky,
        precipitation_type,
    }
}

pub fn normalize_day(day: &VcDay) -> Observation {
    let hourly_rain: Vec<f64> = day.hours.iter().map(|h| h.precip.unwrap_or(0.0)).collect();
    let hourly: Vec<_> = day.hours.iter().map(|h| classify_conditions(&h.conditions)).collect();

    let (sky, precipitation_type) = match (
        most_frequent(hourly.iter().map(|(sky, _)| *sky)),
        most_frequent(hourly.iter().map(|(_, pty)| *pty)),
    ) {
        (Some(sky), Some(pty)) => (sky, pty),
        _ => classify_conditions(&day.conditions),
    };

    Observation {
        temperature: day.temp,
        min_temperature: day.tempmin,
        max_temperature: day.tempmax,
        rain: max(&hourly_rain).unwrap_or(day.precip.unwrap_or(0.0)),
        humidity: day.humidity,
        sky,
        precipitation_type,
    }
}

#[derive(Debug, Clone)]
pub struct VisualCrossingProvider {
    settings: ProviderSettings,
}

impl VisualCrossingProvider {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }

    async fn timeline(&self, path: &str, include: &str) -> Result<VcTimeline, WeatherError> {
        let key = self.settings.require_key(self.id())?;
        let url = format!("{}/{path}", self.settings.base_url);

        let body = get_body(
            &self.settings.http,
            self.id(),
            &url,
            &[("key", key), ("unitGroup", "metric"), ("include", include)],
        )
        .await?;

        parse_json(self.id(), &body)
    }
}

#[async_trait]
impl WeatherProvider for VisualCrossingProvider {
    fn id(&self) -> ProviderId {
        ProviderId::VisualCrossing
    }

    async fn fetch_current(&self, region: &Region) -> Result<RawPayload, WeatherError> {
        let timeline = self.timeline(region.english_name, "current").await?;
        timeline
            .current_conditions
            .map(RawPayload::VisualCrossingCurrent)
            .ok_or_else(|| WeatherError::format(self.id(), "no currentConditions block"))
    }

    async fn fetch_historical(
        &self,
        date: NaiveDate,
        region: &Region,
    ) -> Result<Option<RawPayload>, WeatherError> {
        let path = format!("{}/{}", region.english_name, date.format("%Y-%m-%d"));
        let timeline = self.timeline(&path, "days,hours").await?;
        Ok(timeline.days.into_iter().next().map(RawPayload::VisualCrossingDay))
    }
}
