//! Core library for the `outfit-weather` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Provider adapters and their normalization into one record shape
//! - The current and historical orchestrators with their fallback chains
//! - The historical cache
//!
//! It is used by `outfit-weather-cli`, but can also be reused by other binaries or services.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod current;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod historical;
pub mod model;
pub mod provider;
pub mod region;
pub mod season;

pub use cache::{FileCache, MemoryCache, WeatherCache};
pub use config::{Config, ProviderConfig, TimeoutConfig};
pub use current::CurrentWeatherOrchestrator;
pub use engine::{EngineSettings, WeatherEngine};
pub use error::WeatherError;
pub use historical::HistoricalWeatherOrchestrator;
pub use model::{
    CachedHistoricalEntry, Observation, PrecipitationType, Sky, WeatherIcon, WeatherRecord,
    WeatherSource,
};
pub use provider::{ForecastFeed, ProviderId, ProviderRegistry, RawPayload, WeatherProvider};
pub use region::{Region, RegionDirectory};
