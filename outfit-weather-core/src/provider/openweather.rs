use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Deserialize;

use crate::{
    aggregate::{self, Sample},
    error::WeatherError,
    model::{Observation, PrecipitationType, Sky},
    provider::{
        ProviderId, ProviderSettings, RawPayload, WeatherProvider,
        http::{get_body, parse_json},
    },
    region::Region,
};

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    settings: ProviderSettings,
}

impl OpenWeatherProvider {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }

    async fn get(&self, endpoint: &str, region: &Region) -> Result<String, WeatherError> {
        let key = self.settings.require_key(self.id())?;
        let url = format!("{}/{endpoint}", self.settings.base_url);

        get_body(
            &self.settings.http,
            self.id(),
            &url,
            &[("q", region.english_name), ("appid", key), ("units", "metric")],
        )
        .await
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwMain {
    pub temp: f64,
    pub humidity: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwWeather {
    pub id: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OwRain {
    #[serde(rename = "1h")]
    pub one_hour: Option<f64>,
    #[serde(rename = "3h")]
    pub three_hours: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwCurrentResponse {
    pub main: OwMain,
    pub weather: Vec<OwWeather>,
    #[serde(default)]
    pub rain: Option<OwRain>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwForecastEntry {
    pub dt: i64,
    pub main: OwMain,
    pub weather: Vec<OwWeather>,
    #[serde(default)]
    pub rain: Option<OwRain>,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    /// Shift from UTC in seconds.
    #[serde(default)]
    timezone: i32,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    city: OwCity,
    list: Vec<OwForecastEntry>,
}

/// Weather condition id to `(sky, precipitation)`.
pub fn classify_code(code: u16) -> (Sky, PrecipitationType) {
    match code {
        200..=299 => (Sky::Overcast, PrecipitationType::Shower),
        300..=399 | 500..=599 => (Sky::Overcast, PrecipitationType::Rain),
        600..=699 => (Sky::Overcast, PrecipitationType::Snow),
        800 => (Sky::Clear, PrecipitationType::None),
        801..=802 => (Sky::PartlyCloudy, PrecipitationType::None),
        803.. => (Sky::Overcast, PrecipitationType::None),
        // 7xx: mist, haze, dust
        _ => (Sky::Overcast, PrecipitationType::None),
    }
}

fn first_code(weather: &[OwWeather]) -> Result<u16, WeatherError> {
    weather
        .first()
        .map(|w| w.id)
        .ok_or_else(|| WeatherError::format(ProviderId::OpenWeather, "no weather condition"))
}

pub fn normalize_current(current: &OwCurrentResponse) -> Result<Observation, WeatherError> {
    let (sky, precipitation_type) = classify_code(first_code(&current.weather)?);

    Ok(Observation {
        temperature: current.main.temp,
        min_temperature: None,
        max_temperature: None,
        rain: current.rain.as_ref().and_then(|r| r.one_hour).unwrap_or(0.0),
        humidity: current.main.humidity,
        sky,
        precipitation_type,
    })
}

pub fn normalize_day(entries: &[OwForecastEntry]) -> Result<Observation, WeatherError> {
    let samples = entries
        .iter()
        .map(|entry| {
            let (sky, precipitation_type) = classify_code(first_code(&entry.weather)?);
            Ok(Sample {
                temperature: entry.main.temp,
                rain: entry.rain.as_ref().and_then(|r| r.three_hours).unwrap_or(0.0),
                humidity: entry.main.humidity,
                sky,
                precipitation_type,
            })
        })
        .collect::<Result<Vec<_>, WeatherError>>()?;

    aggregate::summarize(&samples)
        .ok_or_else(|| WeatherError::format(ProviderId::OpenWeather, "no forecast samples"))
}

fn local_date(dt: i64, offset_secs: i32) -> Option<NaiveDate> {
    let offset = FixedOffset::east_opt(offset_secs)?;
    DateTime::from_timestamp(dt, 0).map(|utc| utc.with_timezone(&offset).date_naive())
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeather
    }

    async fn fetch_current(&self, region: &Region) -> Result<RawPayload, WeatherError> {
        let body = self.get("weather", region).await?;
        let parsed: OwCurrentResponse = parse_json(self.id(), &body)?;
        Ok(RawPayload::OpenWeatherCurrent(parsed))
    }

    /// Only the 5-day forecast is available, so past dates have no data.
    async fn fetch_historical(
        &self,
        date: NaiveDate,
        region: &Region,
    ) -> Result<Option<RawPayload>, WeatherError> {
        if date < self.settings.today() {
            return Ok(None);
        }

        let body = self.get("forecast", region).await?;
        let parsed: OwForecastResponse = parse_json(self.id(), &body)?;
        let offset = parsed.city.timezone;

        let entries: Vec<OwForecastEntry> = parsed
            .list
            .into_iter()
            .filter(|e| local_date(e.dt, offset) == Some(date))
            .collect();

        if entries.is_empty() {
            return Ok(None);
        }
        Ok(Some(RawPayload::OpenWeatherDay(entries)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionDirectory;
    use chrono::{Duration, TimeZone, Utc};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn provider(base_url: &str, key: Option<&str>) -> OpenWeatherProvider {
        let settings = ProviderSettings::new(ProviderId::OpenWeather, key.map(str::to_owned), kst())
            .with_base_url(base_url);
        OpenWeatherProvider::new(settings)
    }

    #[test]
    fn code_table() {
        assert_eq!(classify_code(211), (Sky::Overcast, PrecipitationType::Shower));
        assert_eq!(classify_code(301), (Sky::Overcast, PrecipitationType::Rain));
        assert_eq!(classify_code(502), (Sky::Overcast, PrecipitationType::Rain));
        assert_eq!(classify_code(601), (Sky::Overcast, PrecipitationType::Snow));
        assert_eq!(classify_code(800), (Sky::Clear, PrecipitationType::None));
        assert_eq!(classify_code(801), (Sky::PartlyCloudy, PrecipitationType::None));
        assert_eq!(classify_code(802), (Sky::PartlyCloudy, PrecipitationType::None));
        assert_eq!(classify_code(804), (Sky::Overcast, PrecipitationType::None));
    }

    #[tokio::test]
    async fn fetch_current_parses_payload() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "Seoul,KR"))
            .and(query_param("appid", "OPEN_KEY"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Seoul",
                "main": {"temp": 17.3, "feels_like": 16.0, "humidity": 71},
                "weather": [{"id": 500, "description": "light rain"}],
                "rain": {"1h": 0.8}
            })))
            .mount(&mock_server)
            .await;

        let seoul = RegionDirectory::new().resolve("seoul").unwrap();
        let obs = provider(&mock_server.uri(), Some("OPEN_KEY"))
            .fetch_current(seoul)
            .await
            .unwrap()
            .normalize()
            .unwrap();

        assert_eq!(obs.temperature, 17.3);
        assert_eq!(obs.rain, 0.8);
        assert_eq!(obs.humidity, Some(71.0));
        assert_eq!(obs.precipitation_type, PrecipitationType::Rain);
    }

    #[tokio::test]
    async fn http_error_is_reported() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .mount(&mock_server)
            .await;

        let seoul = RegionDirectory::new().resolve("seoul").unwrap();
        let err = provider(&mock_server.uri(), Some("BAD")).fetch_current(seoul).await.unwrap_err();
        assert!(matches!(err, WeatherError::ProviderHttp { status: 401, .. }));
    }

    #[tokio::test]
    async fn past_dates_have_no_data_without_request() {
        let seoul = RegionDirectory::new().resolve("seoul").unwrap();
        let yesterday = Utc::now().with_timezone(&kst()).date_naive() - Duration::days(1);

        let result = provider("http://127.0.0.1:9", Some("OPEN_KEY"))
            .fetch_historical(yesterday, seoul)
            .await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn forecast_day_aggregates_samples_of_that_date() {
        let mock_server = MockServer::start().await;
        let tomorrow = Utc::now().with_timezone(&kst()).date_naive() + Duration::days(1);
        let ts = |hour: u32| {
            kst()
                .from_local_datetime(&tomorrow.and_hms_opt(hour, 0, 0).unwrap())
                .single()
                .unwrap()
                .timestamp()
        };

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "city": {"name": "Seoul", "country": "KR", "timezone": 32400},
                "list": [
                    {"dt": ts(0) - 3 * 3600, "main": {"temp": 40.0, "humidity": 10}, "weather": [{"id": 800}]},
                    {"dt": ts(3), "main": {"temp": 10.0, "humidity": 80}, "weather": [{"id": 500}], "rain": {"3h": 1.2}},
                    {"dt": ts(9), "main": {"temp": 16.0, "humidity": 60}, "weather": [{"id": 500}], "rain": {"3h": 2.4}},
                    {"dt": ts(15), "main": {"temp": 19.0, "humidity": 70}, "weather": [{"id": 804}]}
                ]
            })))
            .mount(&mock_server)
            .await;

        let seoul = RegionDirectory::new().resolve("seoul").unwrap();
        let obs = provider(&mock_server.uri(), Some("OPEN_KEY"))
            .fetch_historical(tomorrow, seoul)
            .await
            .unwrap()
            .expect("forecast covers tomorrow")
            .normalize()
            .unwrap();

        assert_eq!(obs.temperature, 15.0);
        assert_eq!(obs.min_temperature, Some(10.0));
        assert_eq!(obs.max_temperature, Some(19.0));
        assert_eq!(obs.rain, 2.4);
        assert_eq!(obs.precipitation_type, PrecipitationType::Rain);
        assert_eq!(obs.humidity, Some(70.0));
    }
}
