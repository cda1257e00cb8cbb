//! Daily ground-station observations.
//!
//! Only complete days are published, so any date from today on has no data.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    error::WeatherError,
    model::{Observation, PrecipitationType, Sky},
    provider::{
        ProviderId, ProviderSettings, RawPayload, WeatherProvider,
        http::get_body,
        kma::{KmaOutcome, decode, parse_number},
    },
    region::Region,
};

/// Values arrive as strings; missing measurements are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsosDay {
    #[serde(default)]
    pub tm: String,
    #[serde(default)]
    pub avg_ta: String,
    #[serde(default)]
    pub min_ta: String,
    #[serde(default)]
    pub max_ta: String,
    #[serde(default)]
    pub sum_rn: String,
    #[serde(default)]
    pub avg_rhm: String,
}

/// Days warmer than this with no rain count as clear.
const CLEAR_SKY_MIN_TEMP: f64 = 25.0;

pub fn normalize(day: &AsosDay) -> Result<Observation, WeatherError> {
    let temperature = parse_number(&day.avg_ta).ok_or_else(|| {
        WeatherError::format(ProviderId::KmaAsos, format!("avgTa '{}' is not a number", day.avg_ta))
    })?;
    let rain = parse_number(&day.sum_rn).unwrap_or(0.0).max(0.0);

    let sky = if rain > 0.0 {
        Sky::Overcast
    } else if temperature > CLEAR_SKY_MIN_TEMP {
        Sky::Clear
    } else {
        Sky::PartlyCloudy
    };
    let precipitation_type =
        if rain > 0.0 { PrecipitationType::Rain } else { PrecipitationType::None };

    Ok(Observation {
        temperature,
        min_temperature: parse_number(&day.min_ta),
        max_temperature: parse_number(&day.max_ta),
        rain,
        humidity: parse_number(&day.avg_rhm),
        sky,
        precipitation_type,
    })
}

#[derive(Debug, Clone)]
pub struct AsosStationProvider {
    settings: ProviderSettings,
}

impl AsosStationProvider {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl WeatherProvider for AsosStationProvider {
    fn id(&self) -> ProviderId {
        ProviderId::KmaAsos
    }

    async fn fetch_current(&self, _region: &Region) -> Result<RawPayload, WeatherError> {
        Err(WeatherError::unavailable(
            ProviderId::KmaAsos,
            "station observations are daily; there is no current reading",
        ))
    }

    async fn fetch_historical(
        &self,
        date: NaiveDate,
        region: &Region,
    ) -> Result<Option<RawPayload>, WeatherError> {
        if date >= self.settings.today() {
            return Ok(None);
        }

        let id = ProviderId::KmaAsos;
        let key = self.settings.require_key(id)?;
        let day = date.format("%Y%m%d").to_string();

        let url = format!("{}/getWthrDataList", self.settings.base_url);
        let query = [
            ("serviceKey", key.to_string()),
            ("pageNo", "1".to_string()),
            ("numOfRows", "10".to_string()),
            ("dataType", "JSON".to_string()),
            ("dataCd", "ASOS".to_string()),
            ("dateCd", "DAY".to_string()),
            ("startDt", day.clone()),
            ("endDt", day),
            ("stnIds", region.station_id.to_string()),
        ];

        let body = get_body(&self.settings.http, id, &url, &query).await?;

        match decode::<AsosDay>(id, &body)? {
            KmaOutcome::Items(days) => Ok(days.into_iter().next().map(RawPayload::KmaStation)),
            KmaOutcome::NoData => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionDirectory;
    use chrono::{Duration, FixedOffset, Utc};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn day(avg: &str, rain: &str) -> AsosDay {
        AsosDay {
            tm: "2026-10-01".into(),
            avg_ta: avg.into(),
            min_ta: "12.0".into(),
            max_ta: "24.5".into(),
            sum_rn: rain.into(),
            avg_rhm: "63.0".into(),
        }
    }

    fn provider(base_url: &str) -> AsosStationProvider {
        let settings = ProviderSettings::new(
            ProviderId::KmaAsos,
            Some("KMA_KEY".into()),
            FixedOffset::east_opt(9 * 3600).unwrap(),
        )
        .with_base_url(base_url);
        AsosStationProvider::new(settings)
    }

    fn yesterday() -> NaiveDate {
        Utc::now().with_timezone(&FixedOffset::east_opt(9 * 3600).unwrap()).date_naive()
            - Duration::days(1)
    }

    #[test]
    fn sky_rules() {
        let hot_dry = normalize(&day("26.1", "")).unwrap();
        assert_eq!(hot_dry.sky, Sky::Clear);
        assert_eq!(hot_dry.precipitation_type, PrecipitationType::None);
        assert_eq!(hot_dry.rain, 0.0);

        let mild_dry = normalize(&day("18.0", "0")).unwrap();
        assert_eq!(mild_dry.sky, Sky::PartlyCloudy);

        let wet = normalize(&day("26.1", "4.5")).unwrap();
        assert_eq!(wet.sky, Sky::Overcast);
        assert_eq!(wet.precipitation_type, PrecipitationType::Rain);
        assert_eq!(wet.rain, 4.5);
        assert_eq!(wet.min_temperature, Some(12.0));
        assert_eq!(wet.max_temperature, Some(24.5));
        assert_eq!(wet.humidity, Some(63.0));
    }

    #[test]
    fn missing_average_is_format_error() {
        assert!(normalize(&day("", "0")).is_err());
    }

    #[tokio::test]
    async fn today_or_later_has_no_data_without_request() {
        // Unroutable base URL: any request would fail, not return None.
        let provider = provider("http://127.0.0.1:9");
        let seoul = RegionDirectory::new().resolve("seoul").unwrap();

        let result = provider.fetch_historical(yesterday() + Duration::days(1), seoul).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn fetches_station_day() {
        let mock_server = MockServer::start().await;
        let date = yesterday();

        Mock::given(method("GET"))
            .and(path("/getWthrDataList"))
            .and(query_param("stnIds", "108"))
            .and(query_param("startDt", date.format("%Y%m%d").to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": {
                    "header": {"resultCode": "00", "resultMsg": "NORMAL_SERVICE"},
                    "body": {"items": {"item": [
                        {"tm": date.to_string(), "avgTa": "22", "minTa": "17.1",
                         "maxTa": "27.9", "sumRn": "", "avgRhm": "58.4"}
                    ]}}
                }
            })))
            .mount(&mock_server)
            .await;

        let seoul = RegionDirectory::new().resolve("seoul").unwrap();
        let payload = provider(&mock_server.uri())
            .fetch_historical(date, seoul)
            .await
            .unwrap()
            .expect("station should have data");
        let obs = payload.normalize().unwrap();

        assert_eq!(obs.temperature, 22.0);
        assert_eq!(obs.rain, 0.0);
        assert_eq!(obs.max_temperature, Some(27.9));
    }

    #[tokio::test]
    async fn no_data_result_is_none() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/getWthrDataList"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": {"header": {"resultCode": "03", "resultMsg": "NO_DATA"}}
            })))
            .mount(&mock_server)
            .await;

        let seoul = RegionDirectory::new().resolve("seoul").unwrap();
        let result = provider(&mock_server.uri()).fetch_historical(yesterday(), seoul).await;
        assert!(matches!(result, Ok(None)));
    }
}
