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

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    settings: ProviderSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaCondition {
    pub code: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaCurrent {
    pub temp_c: f64,
    pub humidity: Option<f64>,
    #[serde(default)]
    pub precip_mm: f64,
    pub condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    current: WaCurrent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaDay {
    pub avgtemp_c: f64,
    pub mintemp_c: Option<f64>,
    pub maxtemp_c: Option<f64>,
    #[serde(default)]
    pub totalprecip_mm: f64,
    pub avghumidity: Option<f64>,
    pub condition: WaCondition,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaHour {
    #[serde(default)]
    pub precip_mm: f64,
    pub condition: WaCondition,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaForecastDay {
    pub day: WaDay,
    #[serde(default)]
    pub hour: Vec<WaHour>,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WaForecastResponse {
    forecast: WaForecast,
}

/// Condition code to `(sky, precipitation)`. Thunder codes count as rain.
pub fn classify_code(code: u16) -> (Sky, PrecipitationType) {
    match code {
        1000 => (Sky::Clear, PrecipitationType::None),
        1003..=1006 => (Sky::PartlyCloudy, PrecipitationType::None),
        1007..=1009 => (Sky::Overcast, PrecipitationType::None),
        1063..=1201 => (Sky::Overcast, PrecipitationType::Rain),
        1204..=1237 => (Sky::Overcast, PrecipitationType::Snow),
        1240..=1282 => (Sky::Overcast, PrecipitationType::Rain),
        other => {
            tracing::debug!(code = other, "unmapped condition code");
            (Sky::Overcast, PrecipitationType::None)
        }
    }
}

pub fn normalize_current(current: &WaCurrent) -> Observation {
    let (sky, precipitation_type) = classify_code(current.condition.code);
    Observation {
        temperature: current.temp_c,
        min_temperature: None,
        max_temperature: None,
        rain: current.precip_mm,
        humidity: current.humidity,
        sky,
        precipitation_type,
    }
}

/// Hourly samples decide rain and condition; the day block is used when
/// there are none.
pub fn normalize_day(forecast_day: &WaForecastDay) -> Observation {
    let day = &forecast_day.day;
    let hourly_rain: Vec<f64> = forecast_day.hour.iter().map(|h| h.precip_mm).collect();
    let hourly: Vec<_> = forecast_day.hour.iter().map(|h| classify_code(h.condition.code)).collect();

    let (sky, precipitation_type) = match (
        most_frequent(hourly.iter().map(|(sky, _)| *sky)),
        most_frequent(hourly.iter().map(|(_, pty)| *pty)),
    ) {
        (Some(sky), Some(pty)) => (sky, pty),
        _ => classify_code(day.condition.code),
    };

    Observation {
        temperature: day.avgtemp_c,
        min_temperature: day.mintemp_c,
        max_temperature: day.maxtemp_c,
        rain: max(&hourly_rain).unwrap_or(day.totalprecip_mm),
        humidity: day.avghumidity,
        sky,
        precipitation_type,
    }
}

impl WeatherApiProvider {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }

    /// `history.json` for past dates, `forecast.json` from today on.
    async fn fetch_day(
        &self,
        region: &Region,
        date: NaiveDate,
        is_forecast: bool,
    ) -> Result<Option<WaForecastDay>, WeatherError> {
        let key = self.settings.require_key(self.id())?;
        let endpoint = if is_forecast { "forecast.json" } else { "history.json" };
        let url = format!("{}/{endpoint}", self.settings.base_url);
        let dt = date.format("%Y-%m-%d").to_string();

        let body = get_body(
            &self.settings.http,
            self.id(),
            &url,
            &[("key", key), ("q", region.english_name), ("dt", dt.as_str())],
        )
        .await?;

        let parsed: WaForecastResponse = parse_json(self.id(), &body)?;
        Ok(parsed.forecast.forecastday.into_iter().next())
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::WeatherApi
    }

    async fn fetch_current(&self, region: &Region) -> Result<RawPayload, WeatherError> {
        let key = self.settings.require_key(self.id())?;
        let url = format!("{}/current.json", self.settings.base_url);

        let body = get_body(
            &self.settings.http,
            self.id(),
            &url,
            &[("key", key), ("q", region.english_name)],
        )
        .await?;

        let parsed: WaResponse = parse_json(self.id(), &body)?;
        Ok(RawPayload::WeatherApiCurrent(parsed.current))
    }

    async fn fetch_historical(
        &self,
        date: NaiveDate,
        region: &Region,
    ) -> Result<Option<RawPayload>, WeatherError> {
        let is_forecast = date >= self.settings.today();
        let day = self.fetch_day(region, date, is_forecast).await?;
        Ok(day.map(RawPayload::WeatherApiDay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionDirectory;
    use chrono::{Duration, FixedOffset, Utc};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str) -> WeatherApiProvider {
        let settings = ProviderSettings::new(
            ProviderId::WeatherApi,
            Some("WA_KEY".into()),
            FixedOffset::east_opt(9 * 3600).unwrap(),
        )
        .with_base_url(base_url);
        WeatherApiProvider::new(settings)
    }

    #[test]
    fn code_ranges() {
        assert_eq!(classify_code(1000), (Sky::Clear, PrecipitationType::None));
        assert_eq!(classify_code(1003), (Sky::PartlyCloudy, PrecipitationType::None));
        assert_eq!(classify_code(1006), (Sky::PartlyCloudy, PrecipitationType::None));
        assert_eq!(classify_code(1009), (Sky::Overcast, PrecipitationType::None));
        assert_eq!(classify_code(1183), (Sky::Overcast, PrecipitationType::Rain));
        assert_eq!(classify_code(1225), (Sky::Overcast, PrecipitationType::Snow));
        assert_eq!(classify_code(1276), (Sky::Overcast, PrecipitationType::Rain));
    }

    #[tokio::test]
    async fn current_weather() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/current.json"))
            .and(query_param("key", "WA_KEY"))
            .and(query_param("q", "Daegu,KR"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "location": {"name": "Daegu", "country": "South Korea"},
                "current": {"temp_c": 28.0, "humidity": 45, "precip_mm": 0.0,
                            "condition": {"text": "Sunny", "code": 1000}}
            })))
            .mount(&mock_server)
            .await;

        let daegu = RegionDirectory::new().resolve("daegu").unwrap();
        let obs = provider(&mock_server.uri())
            .fetch_current(daegu)
            .await
            .unwrap()
            .normalize()
            .unwrap();

        assert_eq!(obs.temperature, 28.0);
        assert_eq!(obs.sky, Sky::Clear);
        assert_eq!(obs.icon().as_str(), "sunny");
    }

    #[tokio::test]
    async fn history_day_uses_hourly_peak_rain() {
        let mock_server = MockServer::start().await;
        let date = Utc::now().with_timezone(&FixedOffset::east_opt(9 * 3600).unwrap()).date_naive()
            - Duration::days(2);

        Mock::given(method("GET"))
            .and(path("/history.json"))
            .and(query_param("dt", date.format("%Y-%m-%d").to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "forecast": {"forecastday": [{
                    "date": date.to_string(),
                    "day": {"avgtemp_c": 12.5, "mintemp_c": 8.1, "maxtemp_c": 16.0,
                            "totalprecip_mm": 9.0, "avghumidity": 77,
                            "condition": {"code": 1063}},
                    "hour": [
                        {"precip_mm": 0.0, "condition": {"code": 1009}},
                        {"precip_mm": 4.2, "condition": {"code": 1189}},
                        {"precip_mm": 1.1, "condition": {"code": 1183}}
                    ]
                }]}
            })))
            .mount(&mock_server)
            .await;

        let seoul = RegionDirectory::new().resolve("seoul").unwrap();
        let obs = provider(&mock_server.uri())
            .fetch_historical(date, seoul)
            .await
            .unwrap()
            .expect("history should have a day")
            .normalize()
            .unwrap();

        assert_eq!(obs.temperature, 12.5);
        assert_eq!(obs.min_temperature, Some(8.1));
        assert_eq!(obs.max_temperature, Some(16.0));
        assert_eq!(obs.rain, 4.2);
        assert_eq!(obs.humidity, Some(77.0));
        assert_eq!(obs.sky, Sky::Overcast);
        assert_eq!(obs.precipitation_type, PrecipitationType::Rain);
    }

    #[tokio::test]
    async fn empty_forecastday_is_no_data() {
        let mock_server = MockServer::start().await;
        let date = Utc::now().with_timezone(&FixedOffset::east_opt(9 * 3600).unwrap()).date_naive()
            + Duration::days(20);

        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"forecast": {"forecastday": []}})),
            )
            .mount(&mock_server)
            .await;

        let seoul = RegionDirectory::new().resolve("seoul").unwrap();
        let result = provider(&mock_server.uri()).fetch_historical(date, seoul).await;
        assert!(matches!(result, Ok(None)));
    }
}
