//! National short-term grid forecast (primary provider).
//!
//! The service answers with a flat list of `(category, date, time, value)`
//! rows covering roughly three days. Error responses are sometimes plain text
//! or XML even when JSON was requested, so bodies are sniffed before parsing.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    error::WeatherError,
    model::{Observation, PrecipitationType, Sky},
    provider::{
        ForecastFeed, ProviderId, ProviderSettings, RawPayload, WeatherProvider,
        http::{get_body, parse_json},
    },
    region::Region,
};

/// Forecast categories the engine reads.
pub const TMP: &str = "TMP";
pub const PCP: &str = "PCP";
pub const REH: &str = "REH";
pub const SKY: &str = "SKY";
pub const PTY: &str = "PTY";

/// Issue hours of the village forecast; each is published ten minutes later.
const ISSUE_HOURS: [u32; 8] = [2, 5, 8, 11, 14, 17, 20, 23];
const PUBLISH_DELAY_MIN: u32 = 10;

/// One forecast row.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastItem {
    pub category: String,
    pub date: NaiveDate,
    /// "HHMM"
    pub time: String,
    pub value: String,
}

impl ForecastItem {
    pub fn new(category: &str, date: NaiveDate, time: &str, value: &str) -> Self {
        Self {
            category: category.to_string(),
            date,
            time: time.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KmaForecastRow {
    category: String,
    fcst_date: String,
    fcst_time: String,
    fcst_value: String,
}

#[derive(Debug, Deserialize)]
struct KmaEnvelope {
    response: KmaResponse,
}

#[derive(Debug, Deserialize)]
struct KmaResponse {
    header: KmaHeader,
    #[serde(default)]
    body: Option<KmaBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KmaHeader {
    result_code: String,
    #[serde(default)]
    result_msg: String,
}

#[derive(Debug, Deserialize)]
struct KmaBody {
    /// An object `{ "item": [...] }`, or `""` when empty.
    #[serde(default)]
    items: serde_json::Value,
}

/// Decoded result of a data.go.kr style response.
#[derive(Debug)]
pub(crate) enum KmaOutcome<T> {
    Items(Vec<T>),
    NoData,
}

const RESULT_OK: &str = "00";
const RESULT_NO_DATA: &str = "03";

/// Text fragments of error payloads that are not JSON.
fn sniff_error(provider: ProviderId, body: &str) -> Option<WeatherError> {
    if body.contains("SERVICE_KEY_IS_NOT_REGISTERED_ERROR")
        || body.contains("SERVICE_ACCESS_DENIED_ERROR")
    {
        return Some(WeatherError::unavailable(provider, "service key rejected"));
    }
    if body.contains("LIMITED_NUMBER_OF_SERVICE_REQUESTS_EXCEEDS_ERROR") {
        return Some(WeatherError::ProviderHttp {
            provider,
            status: 429,
            body: "request quota exceeded".to_string(),
        });
    }
    if body.contains("<OpenAPI_ServiceResponse>") || body.trim_start().starts_with('<') {
        return Some(WeatherError::format(provider, "service error envelope"));
    }
    if body.contains("Unexpected errors") || body.contains("SERVICE ERROR") {
        return Some(WeatherError::format(provider, "service error"));
    }
    None
}

pub(crate) fn decode<T: DeserializeOwned>(
    provider: ProviderId,
    body: &str,
) -> Result<KmaOutcome<T>, WeatherError> {
    if let Some(err) = sniff_error(provider, body) {
        return Err(err);
    }

    let envelope: KmaEnvelope = parse_json(provider, body)?;
    let header = envelope.response.header;

    match header.result_code.as_str() {
        RESULT_OK => {}
        RESULT_NO_DATA => return Ok(KmaOutcome::NoData),
        code => {
            return Err(WeatherError::format(
                provider,
                format!("result code {code}: {}", header.result_msg),
            ));
        }
    }

    let items = match envelope.response.body.map(|b| b.items) {
        Some(serde_json::Value::Object(mut map)) => map.remove("item"),
        _ => None,
    };

    match items {
        Some(value @ serde_json::Value::Array(_)) => serde_json::from_value(value)
            .map(KmaOutcome::Items)
            .map_err(|e| WeatherError::format(provider, format!("item list: {e}"))),
        _ => Ok(KmaOutcome::Items(Vec::new())),
    }
}

/// Latest forecast issue that is already published at `now` (local time).
pub fn latest_issue(now: NaiveDateTime) -> (NaiveDate, u32) {
    let minutes = now.hour() * 60 + now.minute();
    ISSUE_HOURS
        .iter()
        .rev()
        .find(|&&h| h * 60 + PUBLISH_DELAY_MIN <= minutes)
        .map(|&h| (now.date(), h))
        .unwrap_or_else(|| (now.date() - Duration::days(1), 23))
}

/// Read a `PCP` value such as "강수없음", "1.0mm 미만", "30.0~50.0mm" or "50.0mm 이상".
pub fn parse_precipitation(raw: &str) -> f64 {
    let value = raw.trim();
    if value.is_empty() || value == "강수없음" || value == "-" {
        return 0.0;
    }
    if value.contains("미만") {
        return 0.5;
    }

    let head = value.split('~').next().unwrap_or(value);
    let number: String = head
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    match number.parse::<f64>() {
        Ok(mm) if mm > 0.0 => mm,
        _ => 0.0,
    }
}

pub(crate) fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn value_of<'a>(items: &'a [ForecastItem], category: &str) -> Option<&'a str> {
    items.iter().find(|i| i.category == category).map(|i| i.value.as_str())
}

pub(crate) fn sky_from_code(code: &str) -> Sky {
    Sky::from_code(code).unwrap_or_else(|| {
        tracing::warn!(code, "unexpected SKY code, treating as partly cloudy");
        Sky::PartlyCloudy
    })
}

pub(crate) fn pty_from_code(code: &str) -> PrecipitationType {
    PrecipitationType::from_code(code).unwrap_or_else(|| {
        tracing::warn!(code, "unexpected PTY code, treating as none");
        PrecipitationType::None
    })
}

/// Normalize the rows of one forecast slot.
pub fn normalize_slot(items: &[ForecastItem]) -> Result<Observation, WeatherError> {
    let temperature = value_of(items, TMP)
        .and_then(parse_number)
        .ok_or_else(|| WeatherError::format(ProviderId::Kma, "forecast slot has no TMP"))?;

    Ok(Observation {
        temperature,
        min_temperature: None,
        max_temperature: None,
        rain: value_of(items, PCP).map(parse_precipitation).unwrap_or(0.0),
        humidity: value_of(items, REH).and_then(parse_number),
        sky: value_of(items, SKY).map(sky_from_code).unwrap_or(Sky::PartlyCloudy),
        precipitation_type: value_of(items, PTY)
            .map(pty_from_code)
            .unwrap_or(PrecipitationType::None),
    })
}

/// Rows of the earliest slot at or after `now`, or of the last slot if the
/// forecast lies entirely in the past.
pub fn select_slot(items: &[ForecastItem], now: NaiveDateTime) -> Vec<ForecastItem> {
    let target = (now.date(), format!("{:02}00", now.hour()));

    let slot = items
        .iter()
        .map(|i| (i.date, i.time.clone()))
        .filter(|slot| *slot >= target)
        .min()
        .or_else(|| items.iter().map(|i| (i.date, i.time.clone())).max());

    match slot {
        Some((date, time)) => items
            .iter()
            .filter(|i| i.date == date && i.time == time)
            .cloned()
            .collect(),
        None => Vec::new(),
    }
}

#[derive(Debug, Clone)]
pub struct KmaForecastProvider {
    settings: ProviderSettings,
}

impl KmaForecastProvider {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }

    async fn fetch_items(&self, region: &Region) -> Result<Vec<ForecastItem>, WeatherError> {
        let id = ProviderId::Kma;
        let key = self.settings.require_key(id)?;
        let (base_date, base_hour) = latest_issue(self.settings.local_now().naive_local());

        let url = format!("{}/getVilageFcst", self.settings.base_url);
        let query = [
            ("serviceKey", key.to_string()),
            ("pageNo", "1".to_string()),
            ("numOfRows", "1000".to_string()),
            ("dataType", "JSON".to_string()),
            ("base_date", base_date.format("%Y%m%d").to_string()),
            ("base_time", format!("{base_hour:02}00")),
            ("nx", region.grid_x.to_string()),
            ("ny", region.grid_y.to_string()),
        ];

        let body = get_body(&self.settings.http, id, &url, &query).await?;

        let rows: Vec<KmaForecastRow> = match decode(id, &body)? {
            KmaOutcome::Items(rows) => rows,
            KmaOutcome::NoData => Vec::new(),
        };

        let items: Vec<ForecastItem> = rows
            .into_iter()
            .filter_map(|row| {
                let date = NaiveDate::parse_from_str(&row.fcst_date, "%Y%m%d").ok()?;
                Some(ForecastItem {
                    category: row.category,
                    date,
                    time: row.fcst_time,
                    value: row.fcst_value,
                })
            })
            .collect();

        tracing::debug!(region = region.id, rows = items.len(), "forecast rows received");
        Ok(items)
    }
}

#[async_trait]
impl WeatherProvider for KmaForecastProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Kma
    }

    async fn fetch_current(&self, region: &Region) -> Result<RawPayload, WeatherError> {
        let items = self.fetch_items(region).await?;
        let slot = select_slot(&items, self.settings.local_now().naive_local());

        if slot.is_empty() {
            return Err(WeatherError::format(ProviderId::Kma, "forecast contained no rows"));
        }
        Ok(RawPayload::KmaSlot(slot))
    }

    /// Not a historical source; its rows feed the derived estimate instead.
    async fn fetch_historical(
        &self,
        _date: NaiveDate,
        _region: &Region,
    ) -> Result<Option<RawPayload>, WeatherError> {
        Ok(None)
    }
}

#[async_trait]
impl ForecastFeed for KmaForecastProvider {
    async fn fetch_forecast_items(
        &self,
        region: &Region,
    ) -> Result<Vec<ForecastItem>, WeatherError> {
        self.fetch_items(region).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionDirectory;
    use chrono::{FixedOffset, NaiveTime};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::new(
            NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
        )
    }

    fn settings(base_url: &str, key: Option<&str>) -> ProviderSettings {
        ProviderSettings::new(
            ProviderId::Kma,
            key.map(str::to_owned),
            FixedOffset::east_opt(9 * 3600).unwrap(),
        )
        .with_base_url(base_url)
    }

    #[test]
    fn latest_issue_waits_for_publication() {
        assert_eq!(latest_issue(at("2026-10-19", "05:09")), (at("2026-10-19", "00:00").date(), 2));
        assert_eq!(latest_issue(at("2026-10-19", "05:10")).1, 5);
        assert_eq!(latest_issue(at("2026-10-19", "23:59")).1, 23);

        let (date, hour) = latest_issue(at("2026-10-19", "01:00"));
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        assert_eq!(hour, 23);
    }

    #[test]
    fn precipitation_strings() {
        assert_eq!(parse_precipitation("강수없음"), 0.0);
        assert_eq!(parse_precipitation("1.0mm 미만"), 0.5);
        assert_eq!(parse_precipitation("2.5mm"), 2.5);
        assert_eq!(parse_precipitation("30.0~50.0mm"), 30.0);
        assert_eq!(parse_precipitation("50.0mm 이상"), 50.0);
        assert_eq!(parse_precipitation("-999"), 0.0);
        assert_eq!(parse_precipitation("garbage"), 0.0);
    }

    #[test]
    fn select_slot_prefers_next_slot() {
        let d = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let items = vec![
            ForecastItem::new(TMP, d, "0900", "11"),
            ForecastItem::new(TMP, d, "1000", "13"),
            ForecastItem::new(SKY, d, "1000", "3"),
            ForecastItem::new(TMP, d, "1100", "15"),
        ];

        let slot = select_slot(&items, at("2026-10-19", "09:40"));
        assert_eq!(slot.len(), 1);
        assert_eq!(slot[0].time, "0900");

        let slot = select_slot(&items, at("2026-10-19", "10:05"));
        assert_eq!(slot.len(), 2);

        let slot = select_slot(&items, at("2026-10-20", "10:05"));
        assert_eq!(slot[0].time, "1100");
    }

    #[test]
    fn normalize_slot_reads_categories() {
        let d = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let items = vec![
            ForecastItem::new(TMP, d, "1000", "13"),
            ForecastItem::new(PCP, d, "1000", "1.0mm 미만"),
            ForecastItem::new(REH, d, "1000", "80"),
            ForecastItem::new(SKY, d, "1000", "4"),
            ForecastItem::new(PTY, d, "1000", "1"),
        ];
        let obs = normalize_slot(&items).unwrap();

        assert_eq!(obs.temperature, 13.0);
        assert_eq!(obs.rain, 0.5);
        assert_eq!(obs.humidity, Some(80.0));
        assert_eq!(obs.sky, Sky::Overcast);
        assert_eq!(obs.precipitation_type, PrecipitationType::Rain);
    }

    #[test]
    fn normalize_slot_without_temperature_fails() {
        let d = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let err = normalize_slot(&[ForecastItem::new(SKY, d, "1000", "1")]).unwrap_err();
        assert!(matches!(err, WeatherError::ProviderFormat { .. }));
    }

    #[test]
    fn decode_sniffs_plain_text_errors() {
        let err = decode::<serde_json::Value>(
            ProviderId::Kma,
            "SERVICE ERROR: SERVICE_KEY_IS_NOT_REGISTERED_ERROR",
        )
        .unwrap_err();
        assert!(matches!(err, WeatherError::ProviderUnavailable { .. }));

        let err = decode::<serde_json::Value>(
            ProviderId::Kma,
            "<OpenAPI_ServiceResponse><cmmMsgHeader>LIMITED_NUMBER_OF_SERVICE_REQUESTS_EXCEEDS_ERROR</cmmMsgHeader></OpenAPI_ServiceResponse>",
        )
        .unwrap_err();
        assert!(matches!(err, WeatherError::ProviderHttp { status: 429, .. }));
    }

    #[test]
    fn decode_result_codes() {
        let no_data = r#"{"response":{"header":{"resultCode":"03","resultMsg":"NO_DATA"}}}"#;
        assert!(matches!(
            decode::<serde_json::Value>(ProviderId::KmaAsos, no_data).unwrap(),
            KmaOutcome::NoData
        ));

        let bad = r#"{"response":{"header":{"resultCode":"10","resultMsg":"INVALID_REQUEST_PARAMETER_ERROR"}}}"#;
        let err = decode::<serde_json::Value>(ProviderId::Kma, bad).unwrap_err();
        assert!(err.to_string().contains("INVALID_REQUEST_PARAMETER_ERROR"));

        let empty = r#"{"response":{"header":{"resultCode":"00","resultMsg":"NORMAL_SERVICE"},"body":{"items":""}}}"#;
        match decode::<serde_json::Value>(ProviderId::Kma, empty).unwrap() {
            KmaOutcome::Items(items) => assert!(items.is_empty()),
            KmaOutcome::NoData => panic!("expected empty item list"),
        }
    }

    #[tokio::test]
    async fn fetch_current_requests_grid_and_picks_a_slot() {
        let mock_server = MockServer::start().await;
        let today = chrono::Utc::now()
            .with_timezone(&FixedOffset::east_opt(9 * 3600).unwrap())
            .date_naive()
            + Duration::days(1);
        let date = today.format("%Y%m%d").to_string();

        Mock::given(method("GET"))
            .and(path("/getVilageFcst"))
            .and(query_param("nx", "60"))
            .and(query_param("ny", "127"))
            .and(query_param("serviceKey", "KMA_KEY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": {
                    "header": {"resultCode": "00", "resultMsg": "NORMAL_SERVICE"},
                    "body": {"items": {"item": [
                        {"category": "TMP", "fcstDate": date, "fcstTime": "0600", "fcstValue": "9"},
                        {"category": "SKY", "fcstDate": date, "fcstTime": "0600", "fcstValue": "1"},
                        {"category": "PTY", "fcstDate": date, "fcstTime": "0600", "fcstValue": "0"},
                        {"category": "TMP", "fcstDate": date, "fcstTime": "0700", "fcstValue": "10"}
                    ]}}
                }
            })))
            .mount(&mock_server)
            .await;

        let provider = KmaForecastProvider::new(settings(&mock_server.uri(), Some("KMA_KEY")));
        let seoul = RegionDirectory::new().resolve("seoul").unwrap();

        let payload = provider.fetch_current(seoul).await.unwrap();
        let obs = payload.normalize().unwrap();
        assert_eq!(obs.temperature, 9.0);
        assert_eq!(obs.sky, Sky::Clear);

        let items = provider.fetch_forecast_items(seoul).await.unwrap();
        assert_eq!(items.len(), 4);
    }

    #[tokio::test]
    async fn missing_key_fails_without_request() {
        let provider = KmaForecastProvider::new(settings("http://127.0.0.1:9", None));
        let seoul = RegionDirectory::new().resolve("seoul").unwrap();

        let err = provider.fetch_current(seoul).await.unwrap_err();
        assert!(matches!(err, WeatherError::ProviderUnavailable { provider: ProviderId::Kma, .. }));
    }
}
