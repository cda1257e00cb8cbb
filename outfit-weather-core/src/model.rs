use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::season;

/// Cloud cover, using the primary provider's codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sky {
    #[serde(rename = "1")]
    Clear,
    #[serde(rename = "3")]
    PartlyCloudy,
    #[serde(rename = "4")]
    Overcast,
}

impl Sky {
    pub fn code(&self) -> &'static str {
        match self {
            Sky::Clear => "1",
            Sky::PartlyCloudy => "3",
            Sky::Overcast => "4",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "1" => Some(Sky::Clear),
            "3" => Some(Sky::PartlyCloudy),
            "4" => Some(Sky::Overcast),
            _ => None,
        }
    }
}

/// Form of precipitation, using the primary provider's codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrecipitationType {
    #[serde(rename = "0")]
    None,
    #[serde(rename = "1")]
    Rain,
    #[serde(rename = "2")]
    RainSnow,
    #[serde(rename = "3")]
    Snow,
    #[serde(rename = "4")]
    Shower,
}

impl PrecipitationType {
    pub fn code(&self) -> &'static str {
        match self {
            PrecipitationType::None => "0",
            PrecipitationType::Rain => "1",
            PrecipitationType::RainSnow => "2",
            PrecipitationType::Snow => "3",
            PrecipitationType::Shower => "4",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "0" => Some(PrecipitationType::None),
            "1" => Some(PrecipitationType::Rain),
            "2" => Some(PrecipitationType::RainSnow),
            "3" => Some(PrecipitationType::Snow),
            "4" => Some(PrecipitationType::Shower),
            _ => None,
        }
    }
}

/// Display icon, always derived from `(Sky, PrecipitationType)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherIcon {
    Sunny,
    Cloudy,
    Overcast,
    Rain,
    Snow,
    SnowRain,
    Shower,
}

impl WeatherIcon {
    /// Precipitation wins over cloud cover.
    pub fn derive(sky: Sky, precipitation: PrecipitationType) -> Self {
        match precipitation {
            PrecipitationType::Rain => WeatherIcon::Rain,
            PrecipitationType::RainSnow => WeatherIcon::SnowRain,
            PrecipitationType::Snow => WeatherIcon::Snow,
            PrecipitationType::Shower => WeatherIcon::Shower,
            PrecipitationType::None => match sky {
                Sky::Clear => WeatherIcon::Sunny,
                Sky::PartlyCloudy => WeatherIcon::Cloudy,
                Sky::Overcast => WeatherIcon::Overcast,
            },
        }
    }

    /// Same rule over raw provider codes. An unrecognised sky code is logged
    /// and treated as cloudy.
    pub fn from_codes(sky: &str, precipitation: &str) -> Self {
        let pty = PrecipitationType::from_code(precipitation).unwrap_or(PrecipitationType::None);
        if pty != PrecipitationType::None {
            return Self::derive(Sky::Overcast, pty);
        }
        match Sky::from_code(sky) {
            Some(sky) => Self::derive(sky, pty),
            None => {
                tracing::warn!(sky, "unexpected sky code, defaulting icon to cloudy");
                WeatherIcon::Cloudy
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherIcon::Sunny => "sunny",
            WeatherIcon::Cloudy => "cloudy",
            WeatherIcon::Overcast => "overcast",
            WeatherIcon::Rain => "rain",
            WeatherIcon::Snow => "snow",
            WeatherIcon::SnowRain => "snow_rain",
            WeatherIcon::Shower => "shower",
        }
    }
}

/// Provenance of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeatherSource {
    #[serde(rename = "primary")]
    Primary,
    #[serde(rename = "fallback-A")]
    FallbackA,
    #[serde(rename = "fallback-B")]
    FallbackB,
    #[serde(rename = "fallback-C")]
    FallbackC,
    #[serde(rename = "fallback-D")]
    FallbackD,
    #[serde(rename = "mock")]
    Mock,
    #[serde(rename = "cache")]
    Cache,
    #[serde(rename = "derived")]
    Derived,
    #[serde(rename = "default")]
    Default,
}

impl WeatherSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherSource::Primary => "primary",
            WeatherSource::FallbackA => "fallback-A",
            WeatherSource::FallbackB => "fallback-B",
            WeatherSource::FallbackC => "fallback-C",
            WeatherSource::FallbackD => "fallback-D",
            WeatherSource::Mock => "mock",
            WeatherSource::Cache => "cache",
            WeatherSource::Derived => "derived",
            WeatherSource::Default => "default",
        }
    }

    /// True when the values came from a provider rather than a guess.
    pub fn is_observed(&self) -> bool {
        !matches!(self, WeatherSource::Mock | WeatherSource::Default)
    }
}

impl std::fmt::Display for WeatherSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-agnostic reading produced by an adapter's `normalize` step.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Current reading, or daily mean for historical payloads.
    pub temperature: f64,
    pub min_temperature: Option<f64>,
    pub max_temperature: Option<f64>,
    /// Hourly amount for current readings, peak sample for daily ones.
    pub rain: f64,
    pub humidity: Option<f64>,
    pub sky: Sky,
    pub precipitation_type: PrecipitationType,
}

impl Observation {
    pub fn icon(&self) -> WeatherIcon {
        WeatherIcon::derive(self.sky, self.precipitation_type)
    }
}

/// The record every path converges to.
///
/// The icon is always derived from `(sky, precipitation_type)`, including
/// when a record is read back from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RecordFields")]
pub struct WeatherRecord {
    pub temperature: f64,
    pub average_temperature: f64,
    pub min_temperature: Option<f64>,
    pub max_temperature: Option<f64>,
    pub rain: f64,
    pub humidity: Option<f64>,
    pub sky: Sky,
    pub precipitation_type: PrecipitationType,
    icon: WeatherIcon,
    pub season: String,
    pub weather_expression: String,
    pub season_color: String,
    pub expression_color: String,
    pub source: WeatherSource,
}

/// Every serialized field of [`WeatherRecord`] except the icon.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordFields {
    temperature: f64,
    average_temperature: f64,
    min_temperature: Option<f64>,
    max_temperature: Option<f64>,
    rain: f64,
    humidity: Option<f64>,
    sky: Sky,
    precipitation_type: PrecipitationType,
    season: String,
    weather_expression: String,
    season_color: String,
    expression_color: String,
    source: WeatherSource,
}

impl From<RecordFields> for WeatherRecord {
    fn from(f: RecordFields) -> Self {
        Self {
            temperature: f.temperature,
            average_temperature: f.average_temperature,
            min_temperature: f.min_temperature,
            max_temperature: f.max_temperature,
            rain: f.rain,
            humidity: f.humidity,
            sky: f.sky,
            precipitation_type: f.precipitation_type,
            icon: WeatherIcon::derive(f.sky, f.precipitation_type),
            season: f.season,
            weather_expression: f.weather_expression,
            season_color: f.season_color,
            expression_color: f.expression_color,
            source: f.source,
        }
    }
}

impl WeatherRecord {
    /// Finalise an observation: derive the icon and the presentation fields.
    pub fn build(observation: Observation, season_label: &str, source: WeatherSource) -> Self {
        let expression = season::weather_expression(season_label, observation.temperature);
        Self {
            temperature: observation.temperature,
            average_temperature: observation.temperature,
            min_temperature: observation.min_temperature,
            max_temperature: observation.max_temperature,
            rain: observation.rain,
            humidity: observation.humidity,
            sky: observation.sky,
            precipitation_type: observation.precipitation_type,
            icon: observation.icon(),
            season: season_label.to_string(),
            weather_expression: expression.to_string(),
            season_color: season::season_color(season_label).to_string(),
            expression_color: season::expression_color(expression).to_string(),
            source,
        }
    }

    pub fn icon(&self) -> WeatherIcon {
        self.icon
    }

    pub fn observation(&self) -> Observation {
        Observation {
            temperature: self.average_temperature,
            min_temperature: self.min_temperature,
            max_temperature: self.max_temperature,
            rain: self.rain,
            humidity: self.humidity,
            sky: self.sky,
            precipitation_type: self.precipitation_type,
        }
    }
}

/// Persisted form of a resolved historical record, keyed by `"{date}_{region}"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedHistoricalEntry {
    pub date: NaiveDate,
    pub region: String,
    pub average_temperature: f64,
    pub min_temperature: Option<f64>,
    pub max_temperature: Option<f64>,
    pub rain: f64,
    pub humidity: Option<f64>,
    pub sky: Sky,
    pub precipitation_type: PrecipitationType,
    pub season: String,
    /// Where the values originally came from.
    pub resolved_by: WeatherSource,
    pub cached_at: DateTime<Utc>,
}

impl CachedHistoricalEntry {
    pub fn from_record(date: NaiveDate, region: &str, record: &WeatherRecord) -> Self {
        Self {
            date,
            region: region.to_string(),
            average_temperature: record.average_temperature,
            min_temperature: record.min_temperature,
            max_temperature: record.max_temperature,
            rain: record.rain,
            humidity: record.humidity,
            sky: record.sky,
            precipitation_type: record.precipitation_type,
            season: record.season.clone(),
            resolved_by: record.source,
            cached_at: Utc::now(),
        }
    }

    pub fn to_record(&self) -> WeatherRecord {
        let observation = Observation {
            temperature: self.average_temperature,
            min_temperature: self.min_temperature,
            max_temperature: self.max_temperature,
            rain: self.rain,
            humidity: self.humidity,
            sky: self.sky,
            precipitation_type: self.precipitation_type,
        };
        WeatherRecord::build(observation, &self.season, WeatherSource::Cache)
    }
}

pub fn cache_key(date: NaiveDate, region: &str) -> String {
    format!("{}_{}", date.format("%Y-%m-%d"), region)
}
