use crate::{
    Config,
    error::WeatherError,
    model::{Observation, WeatherSource},
    provider::{
        accuweather::{AccuWeatherProvider, AwCurrent},
        asos::{AsosDay, AsosStationProvider},
        kma::{ForecastItem, KmaForecastProvider},
        openweather::{OpenWeatherProvider, OwCurrentResponse, OwForecastEntry},
        visualcrossing::{VcConditions, VcDay, VisualCrossingProvider},
        weatherapi::{WaCurrent, WaForecastDay, WeatherApiProvider},
    },
    region::Region,
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use reqwest::Client;
use std::{collections::HashMap, convert::TryFrom, fmt::Debug, future::Future, sync::Arc, time::Duration};

pub mod accuweather;
pub mod asos;
mod http;
pub mod kma;
pub mod openweather;
pub mod visualcrossing;
pub mod weatherapi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    /// National short-term grid forecast.
    Kma,
    /// National daily station observations.
    KmaAsos,
    OpenWeather,
    AccuWeather,
    WeatherApi,
    VisualCrossing,
}

impl ProviderId {
    /// Fallbacks tried by the current-weather path, in order.
    pub const CURRENT_FALLBACKS: [ProviderId; 4] = [
        ProviderId::OpenWeather,
        ProviderId::AccuWeather,
        ProviderId::WeatherApi,
        ProviderId::VisualCrossing,
    ];

    /// Sources tried by the historical path, in order.
    pub const HISTORICAL_CHAIN: [ProviderId; 4] = [
        ProviderId::WeatherApi,
        ProviderId::KmaAsos,
        ProviderId::OpenWeather,
        ProviderId::VisualCrossing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Kma => "kma",
            ProviderId::KmaAsos => "kma-asos",
            ProviderId::OpenWeather => "openweather",
            ProviderId::AccuWeather => "accuweather",
            ProviderId::WeatherApi => "weatherapi",
            ProviderId::VisualCrossing => "visualcrossing",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[
            ProviderId::Kma,
            ProviderId::KmaAsos,
            ProviderId::OpenWeather,
            ProviderId::AccuWeather,
            ProviderId::WeatherApi,
            ProviderId::VisualCrossing,
        ]
    }

    /// Provenance tag attached to records this provider produced.
    pub fn source(&self) -> WeatherSource {
        match self {
            ProviderId::Kma | ProviderId::KmaAsos => WeatherSource::Primary,
            ProviderId::OpenWeather => WeatherSource::FallbackA,
            ProviderId::AccuWeather => WeatherSource::FallbackB,
            ProviderId::WeatherApi => WeatherSource::FallbackC,
            ProviderId::VisualCrossing => WeatherSource::FallbackD,
        }
    }

    /// Environment variable that overrides the configured credential.
    pub fn env_var(&self) -> &'static str {
        match self {
            ProviderId::Kma | ProviderId::KmaAsos => "KMA_SERVICE_KEY",
            ProviderId::OpenWeather => "OPENWEATHER_API_KEY",
            ProviderId::AccuWeather => "ACCUWEATHER_API_KEY",
            ProviderId::WeatherApi => "WEATHERAPI_KEY",
            ProviderId::VisualCrossing => "VISUALCROSSING_API_KEY",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderId::Kma => "https://apis.data.go.kr/1360000/VilageFcstInfoService_2.0",
            ProviderId::KmaAsos => "https://apis.data.go.kr/1360000/AsosDalyInfoService",
            ProviderId::OpenWeather => "https://api.openweathermap.org/data/2.5",
            ProviderId::AccuWeather => "https://dataservice.accuweather.com",
            ProviderId::WeatherApi => "https://api.weatherapi.com/v1",
            ProviderId::VisualCrossing => {
                "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline"
            }
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        ProviderId::all()
            .iter()
            .copied()
            .find(|id| id.as_str() == lower)
            .ok_or_else(|| {
                let names: Vec<_> = ProviderId::all().iter().map(|id| id.as_str()).collect();
                anyhow::anyhow!(
                    "Unknown provider '{value}'. Supported providers: {}.",
                    names.join(", ")
                )
            })
    }
}

/// Provider response as received, before normalization.
#[derive(Debug, Clone)]
pub enum RawPayload {
    /// Forecast rows of the single slot closest to "now".
    KmaSlot(Vec<ForecastItem>),
    KmaStation(AsosDay),
    OpenWeatherCurrent(OwCurrentResponse),
    /// 3-hourly forecast entries falling on one local date.
    OpenWeatherDay(Vec<OwForecastEntry>),
    AccuWeatherCurrent(AwCurrent),
    WeatherApiCurrent(WaCurrent),
    WeatherApiDay(WaForecastDay),
    VisualCrossingCurrent(VcConditions),
    VisualCrossingDay(VcDay),
}

impl RawPayload {
    /// Pure mapping of the provider vocabulary to an [`Observation`].
    pub fn normalize(&self) -> Result<Observation, WeatherError> {
        match self {
            RawPayload::KmaSlot(items) => kma::normalize_slot(items),
            RawPayload::KmaStation(day) => asos::normalize(day),
            RawPayload::OpenWeatherCurrent(current) => openweather::normalize_current(current),
            RawPayload::OpenWeatherDay(entries) => openweather::normalize_day(entries),
            RawPayload::AccuWeatherCurrent(current) => Ok(accuweather::normalize(current)),
            RawPayload::WeatherApiCurrent(current) => Ok(weatherapi::normalize_current(current)),
            RawPayload::WeatherApiDay(day) => Ok(weatherapi::normalize_day(day)),
            RawPayload::VisualCrossingCurrent(current) => {
                Ok(visualcrossing::normalize_current(current))
            }
            RawPayload::VisualCrossingDay(day) => Ok(visualcrossing::normalize_day(day)),
        }
    }
}

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    /// One request for the reading at this moment.
    async fn fetch_current(&self, region: &Region) -> Result<RawPayload, WeatherError>;

    /// `Ok(None)` means the provider has no data for `date`; that is not an error.
    async fn fetch_historical(
        &self,
        date: NaiveDate,
        region: &Region,
    ) -> Result<Option<RawPayload>, WeatherError>;
}

/// Raw multi-day forecast rows of the primary provider, used as the
/// last real data source for historical lookups.
#[async_trait]
pub trait ForecastFeed: Send + Sync + Debug {
    async fn fetch_forecast_items(&self, region: &Region)
    -> Result<Vec<ForecastItem>, WeatherError>;
}

/// What every adapter needs to build a request.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub utc_offset: FixedOffset,
    pub http: Client,
}

impl ProviderSettings {
    pub fn new(id: ProviderId, api_key: Option<String>, utc_offset: FixedOffset) -> Self {
        Self {
            api_key,
            base_url: id.default_base_url().to_string(),
            utc_offset,
            http: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Missing credentials fail before any request is made.
    pub(crate) fn require_key(&self, id: ProviderId) -> Result<&str, WeatherError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| WeatherError::unavailable(id, "no API key configured"))
    }

    pub(crate) fn local_now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.utc_offset)
    }

    pub(crate) fn today(&self) -> NaiveDate {
        self.local_now().date_naive()
    }
}

/// Adapters by id. Order of use is fixed by [`ProviderId`], not by insertion.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderId, Arc<dyn WeatherProvider>>,
    forecast_feed: Option<Arc<dyn ForecastFeed>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn WeatherProvider>) -> Self {
        self.providers.insert(provider.id(), provider);
        self
    }

    pub fn with_forecast_feed(mut self, feed: Arc<dyn ForecastFeed>) -> Self {
        self.forecast_feed = Some(feed);
        self
    }

    pub fn get(&self, id: ProviderId) -> Option<&Arc<dyn WeatherProvider>> {
        self.providers.get(&id)
    }

    pub fn forecast_feed(&self) -> Option<&Arc<dyn ForecastFeed>> {
        self.forecast_feed.as_ref()
    }

    /// Every adapter, built from config. Adapters without a key are still
    /// registered and fail fast with `ProviderUnavailable` when called.
    pub fn from_config(config: &Config) -> Self {
        let http = Client::new();
        let mut registry = Self::new();

        for &id in ProviderId::all() {
            let settings = provider_settings(id, config, http.clone());
            registry = match id {
                ProviderId::Kma => {
                    let kma = Arc::new(KmaForecastProvider::new(settings));
                    registry.with_forecast_feed(kma.clone()).with_provider(kma)
                }
                ProviderId::KmaAsos => {
                    registry.with_provider(Arc::new(AsosStationProvider::new(settings)))
                }
                ProviderId::OpenWeather => {
                    registry.with_provider(Arc::new(OpenWeatherProvider::new(settings)))
                }
                ProviderId::AccuWeather => {
                    registry.with_provider(Arc::new(AccuWeatherProvider::new(settings)))
                }
                ProviderId::WeatherApi => {
                    registry.with_provider(Arc::new(WeatherApiProvider::new(settings)))
                }
                ProviderId::VisualCrossing => {
                    registry.with_provider(Arc::new(VisualCrossingProvider::new(settings)))
                }
            };
        }

        registry
    }
}

/// Await `call` for at most `budget`. On expiry the call is dropped, which
/// aborts its in-flight request.
pub(crate) async fn with_budget<T>(
    provider: ProviderId,
    budget: Duration,
    call: impl Future<Output = Result<T, WeatherError>>,
) -> Result<T, WeatherError> {
    tokio::time::timeout(budget, call).await.map_err(|_| WeatherError::Timeout {
        provider,
        budget_ms: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
    })?
}

/// Construct the settings for one provider from config.
pub fn provider_settings(id: ProviderId, config: &Config, http: Client) -> ProviderSettings {
    let base_url = config
        .provider_base_url(id)
        .unwrap_or_else(|| id.default_base_url())
        .trim_end_matches('/')
        .to_string();

    ProviderSettings {
        api_key: config.provider_api_key(id).map(str::to_owned),
        base_url,
        utc_offset: config.utc_offset(),
        http,
    }
}
